//! # Pipeline Configuration
//!
//! Settings for the database, the collaborators and the business constants
//! that may differ between deployments.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     EBD_PAYMENT_API_URL=https://api.pagamentos.example                 │
//! │     EBD_SANDBOX_SELLERS=teste@ebd.example,qa@ebd.example               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/vendas/ebd.toml (Linux)                                  │
//! │     ~/Library/Application Support/com.ebd.vendas/ebd.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # ebd.toml
//! [database]
//! path = "/var/lib/ebd/ebd.db"
//!
//! [shipping]
//! rate_api_url = "https://frete.ebd.example/v1"
//! origin_postal_code = "03023-020"
//! default_item_grams = 150
//! free_threshold = 19990       # centavos
//!
//! [payments]
//! api_url = "https://api.pagamentos.example"
//! sandbox_api_url = "https://sandbox.pagamentos.example"
//! timeout_secs = 15
//!
//! [commission]
//! generic_sale_bps = 150
//! reading_challenge_bps = 500
//!
//! [checkout]
//! sandbox_seller_emails = ["teste@ebd.example"]
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use ebd_core::commission::CommissionContext;
use ebd_core::shipping::{default_pickup_points, ShippingRules};
use ebd_core::validation::normalize_postal_code;
use ebd_core::{
    CarrierRate, CheckoutStrategy, Money, Percent, PickupPoint, FREE_SHIPPING_BUSINESS_DAYS, FREE_SHIPPING_THRESHOLD,
    MAX_DELIVERY_BUSINESS_DAYS, MAX_PRICE,
};
use ebd_db::DbConfig;

use crate::error::{PipelineError, PipelineResult};

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created on first connect.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./ebd.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseSettings {
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.path).max_connections(self.max_connections)
    }
}

// =============================================================================
// Shipping Settings
// =============================================================================

/// Carrier quote endpoint and the resolver's business constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingSettings {
    #[serde(default = "default_rate_api_url")]
    pub rate_api_url: String,

    /// Seconds to wait for a quote before using the fallback rates.
    #[serde(default = "default_timeout_secs")]
    pub rate_timeout_secs: u64,

    /// CEP the parcels leave from.
    #[serde(default = "default_origin_postal_code")]
    pub origin_postal_code: String,

    /// Weight assumed for items without a catalog weight.
    #[serde(default = "default_item_grams")]
    pub default_item_grams: u32,

    #[serde(default = "default_free_threshold")]
    pub free_threshold: Money,

    #[serde(default = "default_free_business_days")]
    pub free_business_days: u32,

    #[serde(default = "default_fallback_standard")]
    pub fallback_standard: CarrierRate,

    #[serde(default = "default_fallback_express")]
    pub fallback_express: CarrierRate,

    #[serde(default = "default_pickup_points")]
    pub pickup_points: Vec<PickupPoint>,
}

fn default_rate_api_url() -> String {
    "http://localhost:8091".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_origin_postal_code() -> String {
    "03023020".to_string()
}

fn default_item_grams() -> u32 {
    150
}

fn default_free_threshold() -> Money {
    FREE_SHIPPING_THRESHOLD
}

fn default_free_business_days() -> u32 {
    FREE_SHIPPING_BUSINESS_DAYS
}

fn default_fallback_standard() -> CarrierRate {
    ShippingRules::default().fallback_standard
}

fn default_fallback_express() -> CarrierRate {
    ShippingRules::default().fallback_express
}

impl Default for ShippingSettings {
    fn default() -> Self {
        ShippingSettings {
            rate_api_url: default_rate_api_url(),
            rate_timeout_secs: default_timeout_secs(),
            origin_postal_code: default_origin_postal_code(),
            default_item_grams: default_item_grams(),
            free_threshold: default_free_threshold(),
            free_business_days: default_free_business_days(),
            fallback_standard: default_fallback_standard(),
            fallback_express: default_fallback_express(),
            pickup_points: default_pickup_points(),
        }
    }
}

impl ShippingSettings {
    pub fn rules(&self) -> ShippingRules {
        ShippingRules {
            free_threshold: self.free_threshold,
            free_business_days: self.free_business_days,
            fallback_standard: self.fallback_standard,
            fallback_express: self.fallback_express,
            pickup_points: self.pickup_points.clone(),
        }
    }

    pub fn rate_timeout(&self) -> Duration {
        Duration::from_secs(self.rate_timeout_secs)
    }
}

// =============================================================================
// Payment Settings
// =============================================================================

/// Payment link and invoicing endpoints.
///
/// Sandbox sellers (see [`CheckoutSettings`]) are routed to
/// `sandbox_api_url` with `sandbox_access_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    #[serde(default = "default_payment_api_url")]
    pub api_url: String,

    #[serde(default = "default_sandbox_api_url")]
    pub sandbox_api_url: String,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub sandbox_access_token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_payment_api_url() -> String {
    "http://localhost:8092".to_string()
}

fn default_sandbox_api_url() -> String {
    "http://localhost:8093".to_string()
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            api_url: default_payment_api_url(),
            sandbox_api_url: default_sandbox_api_url(),
            access_token: None,
            sandbox_access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl PaymentSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Commission Settings
// =============================================================================

/// Commission percentages in basis points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionSettings {
    #[serde(default = "default_generic_sale_bps")]
    pub generic_sale_bps: u32,

    #[serde(default = "default_reading_challenge_bps")]
    pub reading_challenge_bps: u32,
}

fn default_generic_sale_bps() -> u32 {
    CommissionContext::GenericSale.default_percent().bps()
}

fn default_reading_challenge_bps() -> u32 {
    CommissionContext::ReadingChallenge.default_percent().bps()
}

impl Default for CommissionSettings {
    fn default() -> Self {
        CommissionSettings {
            generic_sale_bps: default_generic_sale_bps(),
            reading_challenge_bps: default_reading_challenge_bps(),
        }
    }
}

impl CommissionSettings {
    pub fn percent_for(&self, context: CommissionContext) -> Percent {
        match context {
            CommissionContext::GenericSale => Percent::from_bps(self.generic_sale_bps),
            CommissionContext::ReadingChallenge => Percent::from_bps(self.reading_challenge_bps),
        }
    }
}

// =============================================================================
// Checkout Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Sellers whose proposals go through the sandbox payment account.
    #[serde(default)]
    pub sandbox_seller_emails: Vec<String>,
}

impl CheckoutSettings {
    /// Resolves the checkout strategy of a new proposal. Case-insensitive.
    pub fn strategy_for(&self, seller_email: &str) -> CheckoutStrategy {
        let email = seller_email.trim();
        if self
            .sandbox_seller_emails
            .iter()
            .any(|sandbox| sandbox.trim().eq_ignore_ascii_case(email))
        {
            CheckoutStrategy::Sandbox
        } else {
            CheckoutStrategy::Standard
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub shipping: ShippingSettings,

    #[serde(default)]
    pub payments: PaymentSettings,

    #[serde(default)]
    pub commission: CommissionSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,
}

impl PipelineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (ebd.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> PipelineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading pipeline config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load pipeline config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> PipelineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| PipelineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Pipeline config saved");
        Ok(())
    }

    pub fn validate(&self) -> PipelineResult<()> {
        validate_http_url("shipping.rate_api_url", &self.shipping.rate_api_url)?;
        validate_http_url("payments.api_url", &self.payments.api_url)?;
        validate_http_url("payments.sandbox_api_url", &self.payments.sandbox_api_url)?;

        if self.shipping.rate_timeout_secs == 0 || self.payments.timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "collaborator timeouts must be greater than 0".into(),
            ));
        }

        normalize_postal_code(&self.shipping.origin_postal_code)
            .map_err(|e| PipelineError::InvalidConfig(format!("shipping.origin_postal_code: {}", e)))?;

        if self.shipping.default_item_grams == 0 {
            return Err(PipelineError::InvalidConfig(
                "shipping.default_item_grams must be greater than 0".into(),
            ));
        }

        let amounts = [
            self.shipping.free_threshold,
            self.shipping.fallback_standard.cost,
            self.shipping.fallback_express.cost,
        ];
        if amounts.iter().any(|a| a.is_negative() || *a > MAX_PRICE) {
            return Err(PipelineError::InvalidConfig(format!(
                "shipping amounts must be between 0 and {} centavos",
                MAX_PRICE.cents()
            )));
        }

        let days = [
            self.shipping.free_business_days,
            self.shipping.fallback_standard.business_days,
            self.shipping.fallback_express.business_days,
        ];
        if days.iter().any(|d| *d > MAX_DELIVERY_BUSINESS_DAYS) {
            return Err(PipelineError::InvalidConfig(format!(
                "shipping delivery estimates must be at most {} business days",
                MAX_DELIVERY_BUSINESS_DAYS
            )));
        }

        validate_pickup_points(&self.shipping.pickup_points)?;

        if self.commission.generic_sale_bps > Percent::FULL.bps()
            || self.commission.reading_challenge_bps > Percent::FULL.bps()
        {
            return Err(PipelineError::InvalidConfig(
                "commission percentages must be at most 10000 bps".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(PipelineError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("EBD_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("EBD_RATE_API_URL") {
            debug!(url = %url, "Overriding rate API URL from environment");
            self.shipping.rate_api_url = url;
        }

        if let Ok(url) = std::env::var("EBD_PAYMENT_API_URL") {
            debug!(url = %url, "Overriding payment API URL from environment");
            self.payments.api_url = url;
        }

        // Never log the token itself
        if let Ok(token) = std::env::var("EBD_PAYMENT_ACCESS_TOKEN") {
            debug!("Overriding payment access token from environment");
            self.payments.access_token = Some(token);
        }

        if let Ok(sellers) = std::env::var("EBD_SANDBOX_SELLERS") {
            self.checkout.sandbox_seller_emails = parse_email_list(&sellers);
            debug!(
                count = self.checkout.sandbox_seller_emails.len(),
                "Overriding sandbox sellers from environment"
            );
        }

        if let Ok(secs) = std::env::var("EBD_COLLABORATOR_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => {
                    debug!(secs = s, "Overriding collaborator timeouts from environment");
                    self.shipping.rate_timeout_secs = s;
                    self.payments.timeout_secs = s;
                }
                Err(_) => warn!(value = %secs, "Ignoring non-numeric EBD_COLLABORATOR_TIMEOUT_SECS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "ebd", "vendas").map(|dirs| dirs.config_dir().join("ebd.toml"))
    }
}

fn validate_http_url(field: &str, raw: &str) -> PipelineResult<()> {
    let url = Url::parse(raw).map_err(|e| PipelineError::InvalidUrl(format!("{}: {}", field, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(PipelineError::InvalidUrl(format!(
            "{} must use http or https, got: {}",
            field, other
        ))),
    }
}

/// Pickup is always offered, so at least one point is required. Names
/// identify the point a customer picked and must be unique.
fn validate_pickup_points(points: &[PickupPoint]) -> PipelineResult<()> {
    if points.is_empty() {
        return Err(PipelineError::InvalidConfig(
            "shipping.pickup_points must list at least one point".into(),
        ));
    }

    let mut names = HashSet::new();
    for point in points {
        if point.name.trim().is_empty() || point.address.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "shipping.pickup_points need a name and an address".into(),
            ));
        }
        if !names.insert(point.name.trim()) {
            return Err(PipelineError::InvalidConfig(format!(
                "shipping.pickup_points has a duplicate name: {}",
                point.name
            )));
        }
    }
    Ok(())
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_KEYS: [&str; 3] = [
        "EBD_COLLABORATOR_TIMEOUT_SECS",
        "EBD_SANDBOX_SELLERS",
        "EBD_PAYMENT_API_URL",
    ];

    /// Loads `file` with the given variables set, then clears them.
    fn load_with_env(file: &str, vars: &[(&str, &str)]) -> PipelineResult<PipelineConfig> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ebd.toml");
        std::fs::write(&path, file).unwrap();

        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        let loaded = PipelineConfig::load(Some(path));
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
        loaded
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.shipping.free_threshold, Money::from_cents(19_990));
        assert_eq!(config.shipping.pickup_points.len(), 3);
        assert_eq!(config.commission.generic_sale_bps, 150);
        assert_eq!(config.commission.reading_challenge_bps, 500);
    }

    #[test]
    fn test_config_validation() {
        let mut config = PipelineConfig::default();

        config.payments.api_url = "ftp://payments".to_string();
        assert!(matches!(config.validate(), Err(PipelineError::InvalidUrl(_))));

        config.payments.api_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(PipelineError::InvalidUrl(_))));

        config.payments.api_url = "https://api.pagamentos.example".to_string();
        assert!(config.validate().is_ok());

        config.shipping.origin_postal_code = "123".to_string();
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));

        config.shipping.origin_postal_code = "01310-100".to_string();
        config.commission.generic_sale_bps = 10_001;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));

        config.commission.generic_sale_bps = 150;
        config.payments.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pickup_points_validation() {
        let mut config = PipelineConfig::default();
        config.shipping.pickup_points.clear();
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));

        config.shipping.pickup_points = default_pickup_points();
        config.shipping.pickup_points[1].address = "  ".to_string();
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));

        config.shipping.pickup_points = default_pickup_points();
        config.shipping.pickup_points[2].name = config.shipping.pickup_points[0].name.clone();
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));

        config.shipping.pickup_points.truncate(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shipping_bounds_validation() {
        let mut config = PipelineConfig::default();
        config.shipping.fallback_standard.business_days = MAX_DELIVERY_BUSINESS_DAYS + 1;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));

        config.shipping.fallback_standard.business_days = MAX_DELIVERY_BUSINESS_DAYS;
        assert!(config.validate().is_ok());

        config.shipping.fallback_express.cost = MAX_PRICE + Money::from_cents(1);
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_values() {
        let config = load_with_env(
            r#"
            [payments]
            timeout_secs = 20

            [checkout]
            sandbox_seller_emails = ["arquivo@ebd.example"]
            "#,
            &[
                ("EBD_COLLABORATOR_TIMEOUT_SECS", "7"),
                ("EBD_SANDBOX_SELLERS", "teste@ebd.example, qa@ebd.example"),
            ],
        )
        .unwrap();

        assert_eq!(config.payments.timeout_secs, 7);
        assert_eq!(config.shipping.rate_timeout_secs, 7);
        assert_eq!(
            config.checkout.sandbox_seller_emails,
            vec!["teste@ebd.example".to_string(), "qa@ebd.example".to_string()]
        );
        assert_eq!(config.checkout.strategy_for("QA@ebd.example"), CheckoutStrategy::Sandbox);
    }

    #[test]
    #[serial]
    fn test_non_numeric_timeout_override_is_ignored() {
        let config = load_with_env(
            "[payments]\ntimeout_secs = 20\n",
            &[("EBD_COLLABORATOR_TIMEOUT_SECS", "soon")],
        )
        .unwrap();

        assert_eq!(config.payments.timeout_secs, 20);
        assert_eq!(config.shipping.rate_timeout_secs, 10);
    }

    #[test]
    #[serial]
    fn test_env_overrides_are_validated() {
        let result = load_with_env("", &[("EBD_PAYMENT_API_URL", "ftp://pagamentos.ebd.example")]);
        assert!(matches!(result, Err(PipelineError::InvalidUrl(_))));

        let result = load_with_env("", &[("EBD_COLLABORATOR_TIMEOUT_SECS", "0")]);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_toml_serialization() {
        let config = PipelineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[shipping]"));
        assert!(toml_str.contains("[payments]"));
        assert!(toml_str.contains("[checkout]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [shipping]
            free_threshold = 25000

            [checkout]
            sandbox_seller_emails = ["teste@ebd.example"]
            "#,
        )
        .unwrap();

        assert_eq!(config.shipping.free_threshold, Money::from_cents(25_000));
        assert_eq!(config.shipping.fallback_standard.cost, Money::from_cents(1500));
        assert_eq!(config.payments.timeout_secs, 10);
        assert_eq!(config.checkout.sandbox_seller_emails.len(), 1);
    }

    #[test]
    fn test_rules_follow_settings() {
        let mut settings = ShippingSettings::default();
        settings.free_threshold = Money::from_cents(30_000);
        settings.pickup_points.truncate(1);

        let rules = settings.rules();
        assert_eq!(rules.free_threshold, Money::from_cents(30_000));
        assert_eq!(rules.pickup_points.len(), 1);
    }

    #[test]
    fn test_checkout_strategy_resolution() {
        let checkout = CheckoutSettings {
            sandbox_seller_emails: vec!["Teste@EBD.example".to_string()],
        };
        assert_eq!(checkout.strategy_for(" teste@ebd.example "), CheckoutStrategy::Sandbox);
        assert_eq!(checkout.strategy_for("ana@ebd.example"), CheckoutStrategy::Standard);
    }

    #[test]
    fn test_parse_email_list() {
        assert_eq!(
            parse_email_list("a@x.com, b@x.com,,"),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
    }

    #[test]
    fn test_save_then_load_roundtrip_file() {
        let path = std::env::temp_dir().join(format!("ebd-config-{}.toml", uuid::Uuid::new_v4()));
        let mut config = PipelineConfig::default();
        config.checkout.sandbox_seller_emails = vec!["qa@ebd.example".to_string()];
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let loaded: PipelineConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.checkout.sandbox_seller_emails, vec!["qa@ebd.example".to_string()]);

        std::fs::remove_file(path).unwrap();
    }
}
