//! # Error Types
//!
//! Domain-specific error types for ebd-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  ebd-core errors (this file)                                           │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Malformed input at the boundary                │
//! │                                                                         │
//! │  ebd-db errors (separate crate)                                        │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  ebd-pipeline errors                                                   │
//! │  └── PipelineError    - Collaborator failures + what the seller sees   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → PipelineError → Seller message    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (variant id, proposal id, ...)
//! 3. Business-rule messages tell the seller what to do next

use thiserror::Error;

use crate::types::ProposalStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A proposal cannot be accepted before the customer picks a shipping
    /// option (and no manual shipping value was pre-set by the seller).
    #[error("Choose a shipping option before confirming the proposal")]
    ShippingNotSelected,

    /// The chosen shipping option is not one the rules would offer for this
    /// proposal.
    #[error("Shipping option {label} is not available: {reason}")]
    ShippingNotAvailable { label: String, reason: String },

    /// Invoiced proposals need an installment plan before acceptance.
    #[error("Choose an installment plan before confirming an invoiced proposal")]
    InstallmentPlanNotSelected,

    /// An installment plan was chosen for a proposal without invoicing.
    #[error("Installment plans are only available for invoiced proposals")]
    InvoicingNotEnabled,

    /// The proposal is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Editing quantities after the customer accepted
    /// - Accepting a cancelled proposal
    /// - Marking a pending proposal as paid
    #[error("Proposal {proposal_id} is {current:?}, cannot {operation}")]
    InvalidProposalStatus {
        proposal_id: String,
        current: ProposalStatus,
        operation: String,
    },

    /// A line item was not found in the proposal.
    #[error("Item {0} is not part of this proposal")]
    ItemNotFound(String),

    /// A variant was added twice to the same proposal.
    #[error("Item {0} is already part of this proposal")]
    DuplicateItem(String),

    /// Proposal has exceeded maximum allowed items.
    #[error("A proposal cannot have more than {max} items")]
    ProposalTooLarge { max: usize },

    /// Commission installments only come in 1, 2 or 3 parts.
    #[error("Commission can be split into 1 to 3 installments, got {0}")]
    InvalidInstallmentCount(u32),

    /// Installment was already paid.
    #[error("Commission installment {0} is already paid")]
    InstallmentAlreadyPaid(String),

    /// A church-opening step transition was not allowed.
    #[error("Step cannot move from {from} to {to}")]
    InvalidStepTransition { from: String, to: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any collaborator is contacted, and by pure functions when an
/// invariant (non-negative price, quantity ≥ 1, percent ≤ 100%) is broken.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid postal code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Collection must not be empty.
    #[error("{field} must not be empty")]
    Empty { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidProposalStatus {
            proposal_id: "p-1".to_string(),
            current: ProposalStatus::Paid,
            operation: "change quantities".to_string(),
        };
        assert_eq!(err.to_string(), "Proposal p-1 is Paid, cannot change quantities");

        assert_eq!(
            CoreError::ShippingNotSelected.to_string(),
            "Choose a shipping option before confirming the proposal"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "postal code".to_string(),
        };
        assert_eq!(err.to_string(), "postal code is required");

        let err = ValidationError::Empty {
            field: "items".to_string(),
        };
        assert_eq!(err.to_string(), "items must not be empty");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
