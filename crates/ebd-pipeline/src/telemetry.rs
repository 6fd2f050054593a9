//! Tracing setup for processes embedding the pipeline.

use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,ebd=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=ebd_pipeline=trace` - Trace the collaborator calls only
/// - Default: [`DEFAULT_FILTER`]
///
/// Does nothing when a global subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = subscriber(filter).try_init();
}

/// The filter is the only level control; the builder type keeps it that way.
fn subscriber(filter: EnvFilter) -> SubscriberBuilder<DefaultFields, Format, EnvFilter> {
    tracing_subscriber::fmt().with_env_filter(filter)
}
