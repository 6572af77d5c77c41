//! Job lifecycle rules.
//!
//! Forward edges are strictly adjacent:
//! Unassigned -> Assigned -> OnTheWay -> Arrived -> Completed.
//! Two operational edges are modeled explicitly: unassign (Assigned ->
//! Unassigned) and the admin override, which may jump forward past
//! intermediate states, including straight to Completed. Leaving Unassigned
//! always needs a vendor identity so that `vendorId` is set exactly when the
//! status says a vendor is on the job.

use serde::{Deserialize, Serialize};

use crate::error::RejectReason;
use crate::model::JobStatus;

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Requester {
    #[default]
    Vendor,
    Admin,
    /// Admin holding the named override capability.
    AdminOverride,
}

impl Requester {
    pub fn is_admin(self) -> bool {
        matches!(self, Requester::Admin | Requester::AdminOverride)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vendor" => Some(Requester::Vendor),
            "admin" => Some(Requester::Admin),
            "admin-override" | "admin_override" => Some(Requester::AdminOverride),
            _ => None,
        }
    }
}

/// Which kind of edge an accepted transition follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Adjacent forward step with a vendor already on the job.
    Advance,
    /// Unassigned -> Assigned by an admin naming the vendor directly.
    ManualAssign,
    /// Assigned -> Unassigned, dropping the vendor.
    Unassign,
    /// Override jump straight to Completed.
    ForceComplete,
    /// Override jump forward past intermediate states.
    OverrideSkip,
}

impl Edge {
    /// Whether following this edge from `from` puts a vendor on the job.
    pub fn assigns_vendor(self, from: JobStatus) -> bool {
        !from.requires_vendor() && self != Edge::Unassign
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionRequest {
    pub from: JobStatus,
    pub to: JobStatus,
    pub requester: Requester,
    pub cancelled: bool,
    /// The request names a vendor (needed whenever it leaves Unassigned).
    pub vendor_supplied: bool,
}

/// Decide whether a transition is allowed. Rejections list every reason that
/// applies, never just the first.
pub fn check_transition(req: &TransitionRequest) -> Result<Edge, Vec<RejectReason>> {
    let TransitionRequest {
        from,
        to,
        requester,
        cancelled,
        vendor_supplied,
    } = *req;
    let mut reasons = Vec::new();

    if cancelled {
        reasons.push(RejectReason::JobCancelled);
    }
    if from == JobStatus::Completed {
        reasons.push(RejectReason::TerminalState);
        return Err(reasons);
    }
    if from == to {
        reasons.push(RejectReason::NotAdjacent);
        return Err(reasons);
    }

    let edge = if from.next() == Some(to) {
        if from == JobStatus::Unassigned {
            if !requester.is_admin() {
                reasons.push(RejectReason::RequiresAdmin);
            }
            if !vendor_supplied {
                reasons.push(RejectReason::VendorRequired);
            }
            Edge::ManualAssign
        } else {
            Edge::Advance
        }
    } else if from == JobStatus::Assigned && to == JobStatus::Unassigned {
        Edge::Unassign
    } else if to.rank() > from.rank() {
        if requester != Requester::AdminOverride {
            reasons.push(RejectReason::NotAdjacent);
            reasons.push(RejectReason::RequiresOverride);
        }
        if !from.requires_vendor() && to.requires_vendor() && !vendor_supplied {
            reasons.push(RejectReason::VendorRequired);
        }
        if to == JobStatus::Completed {
            Edge::ForceComplete
        } else {
            Edge::OverrideSkip
        }
    } else {
        reasons.push(RejectReason::BackwardTransition);
        return Err(reasons);
    };

    if reasons.is_empty() {
        Ok(edge)
    } else {
        Err(reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobStatus::*;

    fn check(
        from: JobStatus,
        to: JobStatus,
        requester: Requester,
        vendor_supplied: bool,
    ) -> Result<Edge, Vec<RejectReason>> {
        check_transition(&TransitionRequest {
            from,
            to,
            requester,
            cancelled: false,
            vendor_supplied,
        })
    }

    #[test]
    fn adjacent_forward_for_everyone() {
        for requester in [Requester::Vendor, Requester::Admin, Requester::AdminOverride] {
            assert_eq!(check(Assigned, OnTheWay, requester, false), Ok(Edge::Advance));
            assert_eq!(check(OnTheWay, Arrived, requester, false), Ok(Edge::Advance));
            assert_eq!(check(Arrived, Completed, requester, false), Ok(Edge::Advance));
        }
    }

    #[test]
    fn manual_assignment_is_admin_only_and_needs_vendor() {
        assert_eq!(
            check(Unassigned, Assigned, Requester::Admin, true),
            Ok(Edge::ManualAssign)
        );
        assert_eq!(
            check(Unassigned, Assigned, Requester::Vendor, true),
            Err(vec![RejectReason::RequiresAdmin])
        );
        assert_eq!(
            check(Unassigned, Assigned, Requester::Admin, false),
            Err(vec![RejectReason::VendorRequired])
        );
    }

    #[test]
    fn unassign_allowed() {
        assert_eq!(check(Assigned, Unassigned, Requester::Vendor, false), Ok(Edge::Unassign));
        assert_eq!(check(Assigned, Unassigned, Requester::Admin, false), Ok(Edge::Unassign));
    }

    #[test]
    fn skipping_requires_override() {
        let err = check(Unassigned, Arrived, Requester::Vendor, false).unwrap_err();
        assert!(err.contains(&RejectReason::NotAdjacent));
        assert!(err.contains(&RejectReason::RequiresOverride));
        assert!(err.contains(&RejectReason::VendorRequired));

        let err = check(Assigned, Arrived, Requester::Admin, false).unwrap_err();
        assert_eq!(err, vec![RejectReason::NotAdjacent, RejectReason::RequiresOverride]);

        assert_eq!(
            check(Assigned, Arrived, Requester::AdminOverride, false),
            Ok(Edge::OverrideSkip)
        );
        assert_eq!(
            check(Unassigned, Arrived, Requester::AdminOverride, true),
            Ok(Edge::OverrideSkip)
        );
    }

    #[test]
    fn force_complete_from_anywhere_with_override() {
        assert_eq!(
            check(Assigned, Completed, Requester::AdminOverride, false),
            Ok(Edge::ForceComplete)
        );
        assert_eq!(
            check(Unassigned, Completed, Requester::AdminOverride, true),
            Ok(Edge::ForceComplete)
        );
        assert_eq!(
            check(Unassigned, Completed, Requester::AdminOverride, false),
            Err(vec![RejectReason::VendorRequired])
        );
    }

    #[test]
    fn backward_and_terminal_rejected() {
        assert_eq!(
            check(Arrived, OnTheWay, Requester::AdminOverride, false),
            Err(vec![RejectReason::BackwardTransition])
        );
        assert_eq!(
            check(OnTheWay, Unassigned, Requester::Admin, false),
            Err(vec![RejectReason::BackwardTransition])
        );
        assert_eq!(
            check(Completed, Unassigned, Requester::AdminOverride, false),
            Err(vec![RejectReason::TerminalState])
        );
    }

    #[test]
    fn cancelled_jobs_reject_everything() {
        let err = check_transition(&TransitionRequest {
            from: Assigned,
            to: OnTheWay,
            requester: Requester::AdminOverride,
            cancelled: true,
            vendor_supplied: false,
        })
        .unwrap_err();
        assert_eq!(err, vec![RejectReason::JobCancelled]);
    }

    #[test]
    fn requester_parsing() {
        assert_eq!(Requester::parse("Admin"), Some(Requester::Admin));
        assert_eq!(Requester::parse("admin-override"), Some(Requester::AdminOverride));
        assert_eq!(Requester::parse("vendor"), Some(Requester::Vendor));
        assert_eq!(Requester::parse("root"), None);
        assert_eq!(Requester::default(), Requester::Vendor);
    }

    #[test]
    fn vendor_assigning_edges() {
        assert!(Edge::ManualAssign.assigns_vendor(Unassigned));
        assert!(Edge::ForceComplete.assigns_vendor(Unassigned));
        assert!(!Edge::ForceComplete.assigns_vendor(Assigned));
        assert!(!Edge::Unassign.assigns_vendor(Assigned));
    }
}
