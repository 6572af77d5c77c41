use serde::Serialize;
use thiserror::Error;

use crate::model::JobStatus;

/// Machine-readable reason attached to a 409 rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    AlreadyAssigned,
    BiddingClosed,
    JobCancelled,
    NotAdjacent,
    RequiresAdmin,
    RequiresOverride,
    VendorRequired,
    BackwardTransition,
    TerminalState,
    StaleStatus,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::AlreadyAssigned => "already_assigned",
            RejectReason::BiddingClosed => "bidding_closed",
            RejectReason::JobCancelled => "job_cancelled",
            RejectReason::NotAdjacent => "not_adjacent",
            RejectReason::RequiresAdmin => "requires_admin",
            RejectReason::RequiresOverride => "requires_override",
            RejectReason::VendorRequired => "vendor_required",
            RejectReason::BackwardTransition => "backward_transition",
            RejectReason::TerminalState => "terminal_state",
            RejectReason::StaleStatus => "stale_status",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        reasons: Vec<RejectReason>,
    },

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: JobStatus,
        to: JobStatus,
        reasons: Vec<RejectReason>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn conflict(message: impl Into<String>, reason: RejectReason) -> Self {
        DispatchError::Conflict {
            message: message.into(),
            reasons: vec![reason],
        }
    }

    /// Reasons carried by 409 rejections; empty for every other variant.
    pub fn reasons(&self) -> &[RejectReason] {
        match self {
            DispatchError::Conflict { reasons, .. }
            | DispatchError::InvalidTransition { reasons, .. } => reasons,
            _ => &[],
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DispatchError::Conflict { .. } | DispatchError::InvalidTransition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_only_on_conflicts() {
        let err = DispatchError::conflict("lost", RejectReason::AlreadyAssigned);
        assert!(err.is_conflict());
        assert_eq!(err.reasons(), &[RejectReason::AlreadyAssigned]);

        let err = DispatchError::NotFound("job".to_string());
        assert!(!err.is_conflict());
        assert!(err.reasons().is_empty());
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&RejectReason::RequiresOverride).unwrap();
        assert_eq!(json, "\"requires_override\"");
        assert_eq!(RejectReason::StaleStatus.to_string(), "stale_status");
    }
}
