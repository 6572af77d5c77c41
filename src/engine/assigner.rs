use uuid::Uuid;

use crate::engine::DispatchEngine;
use crate::error::{DispatchError, RejectReason, Result};
use crate::events::DispatchEvent;
use crate::model::{Bid, CapabilityRole, Job, JobStatus, Vendor};
use crate::store::{JobGuard, JobPatch, RevokeScope};

/// Who is picking the winning bid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Admin,
    /// Customer acting through their selection link.
    Customer(String),
}

/// Outcome of a won selection.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub job: Job,
    pub bid: Bid,
    pub vendor: Vendor,
}

impl DispatchEngine {
    /// Select `bid_id` as the winner of its job.
    ///
    /// The whole decision is one conditional write on the job guarded by
    /// `status = Unassigned, biddingOpen = true`. Of any number of concurrent
    /// selections on one job exactly one lands; the rest get a conflict and
    /// leave nothing behind. Retrying after a timeout is therefore safe.
    pub async fn select_bid(&self, bid_id: Uuid, selector: &Selector) -> Result<Assignment> {
        let bid = self
            .store
            .get_bid(bid_id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("bid {}", bid_id)))?;

        if let Selector::Customer(token) = selector {
            let (capability, _) = self
                .resolve_capability(token, CapabilityRole::Customer)
                .await?;
            if capability.revoked || capability.job_id != bid.job_id {
                return Err(DispatchError::NotFound(format!("bid {}", bid_id)));
            }
        }

        let job_id = bid.job_id;
        let candidate_vendor = self
            .store
            .find_vendor_by_phone(&bid.vendor_phone)
            .await?
            .map(|v| v.id)
            .unwrap_or_else(Uuid::new_v4);

        let patch = JobPatch {
            status: Some(JobStatus::Assigned),
            vendor_id: Some(Some(candidate_vendor)),
            vendor_name: Some(Some(bid.vendor_name.clone())),
            vendor_phone: Some(Some(bid.vendor_phone.clone())),
            final_price: Some(Some(bid.price)),
            bidding_open: Some(false),
            winning_bid_id: Some(Some(bid.id)),
            ..Default::default()
        };

        let Some(job) = self
            .store
            .compare_and_swap(job_id, &JobGuard::open_for_bids(), &patch)
            .await?
        else {
            let reason = self.selection_conflict_reason(job_id).await?;
            tracing::info!(
                job_id = %job_id,
                bid_id = %bid_id,
                reason = %reason,
                "Bid selection lost"
            );
            return Err(DispatchError::conflict(
                "bid can no longer be selected",
                reason,
            ));
        };

        let (job, vendor) = self
            .settle_vendor(job, candidate_vendor, &bid.vendor_name, &bid.vendor_phone)
            .await;
        self.close_vendor_links(job_id).await;

        tracing::info!(
            job_id = %job_id,
            bid_id = %bid_id,
            vendor_id = %vendor.id,
            final_price = bid.price,
            selector = selector_kind(selector),
            "Bid selected, job assigned"
        );
        self.publish(DispatchEvent::JobAssigned {
            job_id,
            bid_id: Some(bid.id),
            vendor_id: vendor.id,
            vendor_name: vendor.name.clone(),
            vendor_phone: vendor.phone.clone(),
            final_price: job.final_price,
        });

        Ok(Assignment { job, bid, vendor })
    }

    /// Why a selection guard no longer matched, from the job as it is now.
    async fn selection_conflict_reason(&self, job_id: Uuid) -> Result<RejectReason> {
        let job = self.get_job(job_id).await?;
        Ok(if job.cancelled {
            RejectReason::JobCancelled
        } else if job.status != JobStatus::Unassigned {
            RejectReason::AlreadyAssigned
        } else {
            RejectReason::BiddingClosed
        })
    }

    /// Upsert the canonical vendor record for a freshly assigned job.
    ///
    /// Runs after the assignment has committed, so failures are logged rather
    /// than surfaced. If the phone was registered concurrently under a
    /// different id, the job is re-pointed at the canonical record.
    pub(crate) async fn settle_vendor(
        &self,
        job: Job,
        candidate: Uuid,
        name: &str,
        phone: &str,
    ) -> (Job, Vendor) {
        let shell = Vendor::shell(candidate, name.to_string(), phone.to_string(), self.clock.now());
        let vendor = match self.store.upsert_vendor(shell.clone()).await {
            Ok(vendor) => vendor,
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    vendor_id = %candidate,
                    error = %e,
                    "Vendor upsert failed after assignment"
                );
                return (job, shell);
            }
        };
        if vendor.id == candidate {
            return (job, vendor);
        }

        let repoint = JobPatch {
            vendor_id: Some(Some(vendor.id)),
            ..Default::default()
        };
        let guard = JobGuard::any().with_vendor_id(Some(candidate));
        match self.store.compare_and_swap(job.id, &guard, &repoint).await {
            Ok(Some(updated)) => (updated, vendor),
            Ok(None) => (job, vendor),
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to re-point job at canonical vendor");
                (job, vendor)
            }
        }
    }

    /// Revoke the vendor capability once bidding has closed. The job's own
    /// guard already refuses bids, so a failure here is only logged.
    pub(crate) async fn close_vendor_links(&self, job_id: Uuid) {
        if let Err(e) = self
            .store
            .revoke_capabilities(job_id, RevokeScope::Role(CapabilityRole::Vendor))
            .await
        {
            tracing::warn!(job_id = %job_id, error = %e, "Failed to revoke vendor link");
        }
    }
}

fn selector_kind(selector: &Selector) -> &'static str {
    match selector {
        Selector::Admin => "admin",
        Selector::Customer(_) => "customer",
    }
}
