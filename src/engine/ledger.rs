use uuid::Uuid;

use crate::engine::DispatchEngine;
use crate::error::{DispatchError, RejectReason, Result};
use crate::events::DispatchEvent;
use crate::model::{Bid, BidSubmission, CapabilityRole, Job};
use crate::store::JobGuard;

fn closed_reason(job: &Job) -> RejectReason {
    if job.cancelled {
        RejectReason::JobCancelled
    } else if job.vendor_id.is_some() {
        RejectReason::AlreadyAssigned
    } else {
        RejectReason::BiddingClosed
    }
}

impl DispatchEngine {
    /// Record a bid submitted through a vendor link.
    ///
    /// Every submission becomes its own row, including repeat bids from the
    /// same vendor. The row is appended only if, at the moment of the write,
    /// the job is still Unassigned with bidding open under this very token.
    pub async fn submit_bid(&self, vendor_token: &str, submission: BidSubmission) -> Result<Bid> {
        let (capability, job) = self
            .resolve_capability(vendor_token, CapabilityRole::Vendor)
            .await?;
        let bid = submission.into_bid(job.id, self.clock.now())?;

        if capability.revoked || !job.is_open_for_bids() {
            return Err(DispatchError::conflict(
                "bidding is closed for this job",
                closed_reason(&job),
            ));
        }

        let guard = JobGuard::open_for_bids().with_vendor_token(vendor_token);
        if !self.store.append_bid(bid.clone(), &guard).await? {
            tracing::info!(job_id = %job.id, "Bid rejected, bidding closed mid-submission");
            return Err(DispatchError::conflict(
                "bidding is closed for this job",
                RejectReason::BiddingClosed,
            ));
        }

        tracing::info!(
            job_id = %job.id,
            bid_id = %bid.id,
            price = bid.price,
            eta_minutes = bid.eta_minutes,
            "Bid accepted"
        );
        self.publish(DispatchEvent::BidSubmitted {
            job_id: job.id,
            bid_id: bid.id,
        });
        Ok(bid)
    }

    /// All bids for a job in submission order.
    pub async fn list_bids(&self, job_id: Uuid) -> Result<Vec<Bid>> {
        self.get_job(job_id).await?;
        self.store.bids_for_job(job_id).await
    }

    /// Bids visible through a customer link.
    pub async fn customer_bids(&self, customer_token: &str) -> Result<Vec<Bid>> {
        let (capability, job) = self
            .resolve_capability(customer_token, CapabilityRole::Customer)
            .await?;
        if capability.revoked {
            return Err(DispatchError::NotFound("customer link".to_string()));
        }
        self.store.bids_for_job(job.id).await
    }
}
