//! Helpers shared by the HTTP collaborator clients.

use url::Url;

use crate::error::PipelineResult;

/// Parses a base URL so that `join` appends to its path.
///
/// `https://api.example/v1` joined with `quotes` would otherwise drop `v1`.
pub(crate) fn parse_base_url(raw: &str) -> PipelineResult<Url> {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("{}/", trimmed))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_keeps_base_path() {
        let base = parse_base_url("https://frete.ebd.example/v1").unwrap();
        assert_eq!(base.join("quotes").unwrap().as_str(), "https://frete.ebd.example/v1/quotes");

        let root = parse_base_url("http://127.0.0.1:8091").unwrap();
        assert_eq!(root.join("quotes").unwrap().as_str(), "http://127.0.0.1:8091/quotes");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(parse_base_url("not a url").is_err());
    }
}
