use serde::Serialize;
use uuid::Uuid;

use crate::engine::DispatchEngine;
use crate::error::{DispatchError, RejectReason, Result};
use crate::events::DispatchEvent;
use crate::model::{Capability, CapabilityRole, Job, JobStatus};
use crate::store::{JobGuard, JobPatch, RevokeScope};

/// Derives the public links handed out when bidding opens.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base: String,
}

impl LinkBuilder {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Status-tracking page keyed by job id; safe to share broadly.
    pub fn status_url(&self, job_id: Uuid) -> String {
        format!("{}/track/{}", self.base, job_id)
    }

    pub fn vendor_link(&self, token: &str) -> String {
        format!("{}/bid/{}", self.base, token)
    }

    pub fn customer_link(&self, token: &str) -> String {
        format!("{}/choose/{}", self.base, token)
    }

    /// Links for the tokens currently on `job`, or `None` if bidding was
    /// never opened.
    pub fn for_job(&self, job: &Job) -> Option<BiddingLinks> {
        let vendor_token = job.vendor_token.as_ref()?;
        let customer_token = job.customer_token.as_ref()?;
        Some(BiddingLinks {
            job_id: job.id,
            status_url: self.status_url(job.id),
            vendor_link: self.vendor_link(vendor_token),
            customer_link: self.customer_link(customer_token),
            vendor_token: vendor_token.clone(),
            customer_token: customer_token.clone(),
            bidding_open: job.bidding_open,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiddingLinks {
    pub job_id: Uuid,
    pub status_url: String,
    pub vendor_link: String,
    pub customer_link: String,
    pub vendor_token: String,
    pub customer_token: String,
    pub bidding_open: bool,
}

impl DispatchEngine {
    /// Open `job_id` for bids: mint fresh vendor and customer capabilities,
    /// store them on the job and set `biddingOpen`.
    ///
    /// Calling it again re-mints both tokens; links handed out earlier stop
    /// working. Concurrent callers race on the same write and the last one
    /// to land owns the job's links.
    pub async fn open_bidding(&self, job_id: Uuid) -> Result<BiddingLinks> {
        let job = self.get_job(job_id).await?;
        if job.cancelled {
            return Err(DispatchError::conflict(
                "job is cancelled",
                RejectReason::JobCancelled,
            ));
        }
        if job.status != JobStatus::Unassigned {
            return Err(DispatchError::conflict(
                format!("job is already {}", job.status),
                RejectReason::AlreadyAssigned,
            ));
        }

        let now = self.clock.now();
        let vendor = Capability::mint(job_id, CapabilityRole::Vendor, now);
        let customer = Capability::mint(job_id, CapabilityRole::Customer, now);
        let patch = JobPatch {
            vendor_token: Some(Some(vendor.token.clone())),
            customer_token: Some(Some(customer.token.clone())),
            bidding_open: Some(true),
            ..Default::default()
        };

        let updated = self
            .store
            .compare_and_swap(job_id, &JobGuard::in_status(JobStatus::Unassigned), &patch)
            .await?
            .ok_or_else(|| {
                DispatchError::conflict(
                    "job left Unassigned while bidding was opening",
                    RejectReason::AlreadyAssigned,
                )
            })?;

        self.store.put_capability(vendor).await?;
        self.store.put_capability(customer).await?;
        let revoked = self
            .store
            .revoke_capabilities(job_id, RevokeScope::Superseded)
            .await?;

        tracing::info!(job_id = %job_id, revoked, "Bidding opened");
        self.publish(DispatchEvent::BiddingOpened { job_id });

        self.links
            .for_job(&updated)
            .ok_or_else(|| DispatchError::Internal("minted tokens missing from job".to_string()))
    }

    /// Links for the tokens currently on the job.
    pub async fn links(&self, job_id: Uuid) -> Result<BiddingLinks> {
        let job = self.get_job(job_id).await?;
        self.links.for_job(&job).ok_or_else(|| {
            DispatchError::NotFound(format!("bidding was never opened for job {}", job_id))
        })
    }

    /// Resolve a token to its capability and job.
    ///
    /// The token must be known, carry `role`, and still be the token stored
    /// on the job; superseded tokens resolve as not found. Revoked-but-current
    /// capabilities are returned so callers can answer with a conflict.
    pub async fn resolve_capability(
        &self,
        token: &str,
        role: CapabilityRole,
    ) -> Result<(Capability, Job)> {
        let not_found = || DispatchError::NotFound(format!("{} link", role));

        let capability = self
            .store
            .get_capability(token)
            .await?
            .filter(|c| c.role == role)
            .ok_or_else(not_found)?;
        let job = self
            .store
            .get_job(capability.job_id)
            .await?
            .ok_or_else(not_found)?;

        let current = match role {
            CapabilityRole::Vendor => job.vendor_token.as_deref(),
            CapabilityRole::Customer => job.customer_token.as_deref(),
        };
        if current != Some(token) {
            return Err(not_found());
        }
        Ok((capability, job))
    }

    /// Job summary for the vendor bid form.
    pub async fn vendor_view(&self, vendor_token: &str) -> Result<Job> {
        let (_, job) = self
            .resolve_capability(vendor_token, CapabilityRole::Vendor)
            .await?;
        Ok(job)
    }
}
