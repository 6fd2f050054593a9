//! # Pipeline Error Types
//!
//! Errors raised while orchestrating proposals against the collaborators.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Pipeline Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │  Collaborators  │  │     Domain              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Collaborator   │  │  Core (state machine,   │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │   business rules)       │ │
//! │  │  ConfigLoad/Save│  │                 │  │  Validation             │ │
//! │  └─────────────────┘  └─────────────────┘  │  ProposalNotFound       │ │
//! │                                            └─────────────────────────┘ │
//! │  ┌─────────────────┐                                                   │
//! │  │   Persistence   │  Validation errors are raised before any          │
//! │  │                 │  collaborator is contacted. Carrier failures      │
//! │  │  Db             │  never reach the caller (fallback rates are       │
//! │  └─────────────────┘  used instead).                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use thiserror::Error;

use ebd_core::{CoreError, ValidationError};
use ebd_db::DbError;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

// =============================================================================
// Collaborator Step
// =============================================================================

/// External call that failed. Names the step in user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaboratorStep {
    CarrierRates,
    PaymentLink,
    InvoicedOrder,
}

impl fmt::Display for CollaboratorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollaboratorStep::CarrierRates => write!(f, "carrier rate quote"),
            CollaboratorStep::PaymentLink => write!(f, "payment link creation"),
            CollaboratorStep::InvoicedOrder => write!(f, "invoiced order creation"),
        }
    }
}

// =============================================================================
// Pipeline Error
// =============================================================================

#[derive(Debug, Error)]
pub enum PipelineError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid collaborator URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// The collaborator answered with an error or could not be reached.
    ///
    /// `message` is the collaborator's own text, kept verbatim.
    #[error("{step} failed: {message}")]
    Collaborator {
        step: CollaboratorStep,
        message: String,
        retryable: bool,
    },

    #[error("{step} timed out after {secs} seconds")]
    Timeout { step: CollaboratorStep, secs: u64 },

    // =========================================================================
    // Domain Errors
    // =========================================================================
    #[error("Proposal {0} not found")]
    ProposalNotFound(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for PipelineError {
    fn from(err: url::ParseError) -> Self {
        PipelineError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for PipelineError {
    fn from(err: toml::ser::Error) -> Self {
        PipelineError::ConfigSaveFailed(err.to_string())
    }
}

impl PipelineError {
    /// Wraps a transport-level reqwest failure of `step`.
    pub(crate) fn transport(step: CollaboratorStep, err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            return PipelineError::Timeout {
                step,
                secs: timeout_secs,
            };
        }
        PipelineError::Collaborator {
            step,
            message: err.to_string(),
            retryable: err.is_connect() || err.is_request(),
        }
    }

    /// Wraps a non-success HTTP answer. 5xx and 429 are worth retrying.
    pub(crate) fn http_status(step: CollaboratorStep, status: reqwest::StatusCode, body: String) -> Self {
        PipelineError::Collaborator {
            step,
            message: format!("HTTP {}: {}", status.as_u16(), body),
            retryable: status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS,
        }
    }

    // =========================================================================
    // Error Categorization
    // =========================================================================

    /// Returns true if the operation can be retried as is.
    ///
    /// Timeouts and transient collaborator failures are retryable. Business
    /// rule violations and validation errors are not: the input must change.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Timeout { .. } => true,
            PipelineError::Collaborator { retryable, .. } => *retryable,
            PipelineError::Db(err) => err.is_transient(),
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidConfig(_)
                | PipelineError::InvalidUrl(_)
                | PipelineError::ConfigLoadFailed(_)
                | PipelineError::ConfigSaveFailed(_)
        )
    }

    /// Message for the seller or customer. Names the failed step and whether
    /// trying again makes sense.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Collaborator { step, message, .. } => {
                let advice = if self.is_retryable() {
                    "Please try again in a few minutes."
                } else {
                    "Check the proposal data before trying again."
                };
                format!("The {} did not succeed ({}). {}", step, message, advice)
            }
            PipelineError::Timeout { step, .. } => format!(
                "The {} is taking too long to answer. Please try again in a few minutes.",
                step
            ),
            PipelineError::ProposalNotFound(_) => "This proposal no longer exists.".to_string(),
            PipelineError::Core(err) => err.to_string(),
            PipelineError::Validation(err) => err.to_string(),
            PipelineError::Db(_) => "Could not save the proposal. Please try again.".to_string(),
            PipelineError::InvalidConfig(_)
            | PipelineError::InvalidUrl(_)
            | PipelineError::ConfigLoadFailed(_)
            | PipelineError::ConfigSaveFailed(_) => {
                "The sales service is misconfigured. Contact support.".to_string()
            }
        }
    }
}
