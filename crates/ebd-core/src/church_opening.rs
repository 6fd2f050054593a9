//! # Church Opening Steps
//!
//! A church becomes `ChurchWithRegistration` (and so eligible for invoicing)
//! by going through document steps that a reviewer approves one by one.
//!
//! ```text
//!   InProgress ──submit()──► PendingApproval ──approve()──► Completed
//!        ▲                        │                             │
//!        │                  request_adjustment(note)            │
//!        │                        ▼                             │
//!        └───resume()──── NeedsAdjustment(note)                 │
//!        └──────────────────────reset()─────────────────────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

/// State of one document step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChurchOpeningStepStatus {
    #[default]
    InProgress,
    PendingApproval,
    Completed,
    /// Sent back by the reviewer with what to fix.
    NeedsAdjustment { note: String },
}

impl ChurchOpeningStepStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ChurchOpeningStepStatus::InProgress => "in_progress",
            ChurchOpeningStepStatus::PendingApproval => "pending_approval",
            ChurchOpeningStepStatus::Completed => "completed",
            ChurchOpeningStepStatus::NeedsAdjustment { .. } => "needs_adjustment",
        }
    }

    /// Submits the step for review.
    pub fn submit(&self) -> CoreResult<Self> {
        match self {
            ChurchOpeningStepStatus::InProgress => Ok(ChurchOpeningStepStatus::PendingApproval),
            _ => Err(self.invalid("pending_approval")),
        }
    }

    pub fn approve(&self) -> CoreResult<Self> {
        match self {
            ChurchOpeningStepStatus::PendingApproval => Ok(ChurchOpeningStepStatus::Completed),
            _ => Err(self.invalid("completed")),
        }
    }

    /// Sends the step back. The note is required so the church knows what to
    /// change.
    pub fn request_adjustment(&self, note: impl Into<String>) -> CoreResult<Self> {
        let note = note.into();
        if note.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "adjustment note".to_string(),
            }
            .into());
        }
        match self {
            ChurchOpeningStepStatus::PendingApproval => Ok(ChurchOpeningStepStatus::NeedsAdjustment {
                note: note.trim().to_string(),
            }),
            _ => Err(self.invalid("needs_adjustment")),
        }
    }

    /// Reopens a step sent back for adjustment.
    pub fn resume(&self) -> CoreResult<Self> {
        match self {
            ChurchOpeningStepStatus::NeedsAdjustment { .. } => Ok(ChurchOpeningStepStatus::InProgress),
            _ => Err(self.invalid("in_progress")),
        }
    }

    /// Explicit reset, the only way back from `Completed`.
    pub fn reset(&self) -> Self {
        ChurchOpeningStepStatus::InProgress
    }

    fn invalid(&self, to: &str) -> CoreError {
        CoreError::InvalidStepTransition {
            from: self.name().to_string(),
            to: to.to_string(),
        }
    }
}

impl fmt::Display for ChurchOpeningStepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// True when every step is completed.
pub fn all_steps_completed(steps: &[ChurchOpeningStepStatus]) -> bool {
    !steps.is_empty() && steps.iter().all(|s| *s == ChurchOpeningStepStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let step = ChurchOpeningStepStatus::default();
        let step = step.submit().unwrap();
        assert_eq!(step, ChurchOpeningStepStatus::PendingApproval);
        let step = step.approve().unwrap();
        assert_eq!(step, ChurchOpeningStepStatus::Completed);
    }

    #[test]
    fn test_adjustment_loop() {
        let step = ChurchOpeningStepStatus::PendingApproval
            .request_adjustment("  CNPJ ilegível ")
            .unwrap();
        assert_eq!(
            step,
            ChurchOpeningStepStatus::NeedsAdjustment {
                note: "CNPJ ilegível".to_string()
            }
        );
        assert!(step.approve().is_err());
        assert_eq!(step.resume().unwrap(), ChurchOpeningStepStatus::InProgress);
    }

    #[test]
    fn test_adjustment_requires_note() {
        assert!(matches!(
            ChurchOpeningStepStatus::PendingApproval.request_adjustment(" "),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_completed_only_leaves_by_reset() {
        let done = ChurchOpeningStepStatus::Completed;
        assert!(matches!(done.submit(), Err(CoreError::InvalidStepTransition { .. })));
        assert!(done.resume().is_err());
        assert!(done.request_adjustment("x").is_err());
        assert_eq!(done.reset(), ChurchOpeningStepStatus::InProgress);
    }

    #[test]
    fn test_all_steps_completed() {
        assert!(!all_steps_completed(&[]));
        assert!(all_steps_completed(&vec![ChurchOpeningStepStatus::Completed; 3]));
        assert!(!all_steps_completed(&[
            ChurchOpeningStepStatus::Completed,
            ChurchOpeningStepStatus::InProgress
        ]));
    }
}
