//! Durable records and the conditional-write primitive.
//!
//! Every invariant-bearing mutation in the engine goes through
//! [`DispatchStore::compare_and_swap`]: a single write against one job that
//! applies a [`JobPatch`] only if the job still satisfies a [`JobGuard`].
//! `Ok(None)` means zero records matched, i.e. some other writer got there
//! first. Assignment and bid acceptance reduce to this one rule; the unbid
//! alert claim applies the same guard together with the alert insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    Alert, Bid, Capability, CapabilityRole, Job, JobStatus, Priority, Vendor,
};

pub mod memory;

pub use memory::MemoryStore;

/// Expected field values a job must still hold for a conditional write to apply.
/// Unset fields are not compared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobGuard {
    pub status: Option<JobStatus>,
    pub bidding_open: Option<bool>,
    pub cancelled: Option<bool>,
    pub vendor_token: Option<String>,
    pub vendor_id: Option<Option<Uuid>>,
    pub alert_unclaimed: bool,
}

impl JobGuard {
    /// Matches any existing job.
    pub fn any() -> Self {
        Self::default()
    }

    /// `status = Unassigned, biddingOpen = true, cancelled = false`.
    pub fn open_for_bids() -> Self {
        Self {
            status: Some(JobStatus::Unassigned),
            bidding_open: Some(true),
            cancelled: Some(false),
            ..Self::default()
        }
    }

    /// Job still in `status` and not cancelled.
    pub fn in_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            cancelled: Some(false),
            ..Self::default()
        }
    }

    /// `unbidAlertSentAt = null`, nothing else.
    pub fn alert_unclaimed() -> Self {
        Self {
            alert_unclaimed: true,
            ..Self::default()
        }
    }

    pub fn with_vendor_token(mut self, token: impl Into<String>) -> Self {
        self.vendor_token = Some(token.into());
        self
    }

    pub fn with_vendor_id(mut self, vendor_id: Option<Uuid>) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        if let Some(open) = self.bidding_open {
            if job.bidding_open != open {
                return false;
            }
        }
        if let Some(cancelled) = self.cancelled {
            if job.cancelled != cancelled {
                return false;
            }
        }
        if let Some(ref token) = self.vendor_token {
            if job.vendor_token.as_deref() != Some(token.as_str()) {
                return false;
            }
        }
        if let Some(vendor_id) = self.vendor_id {
            if job.vendor_id != vendor_id {
                return false;
            }
        }
        !(self.alert_unclaimed && job.unbid_alert_sent_at.is_some())
    }
}

/// Field updates applied by a successful conditional write. `None` leaves a
/// field untouched; `Some(None)` clears a nullable field.
///
/// There is no `unbid_alert_sent_at` field: only
/// [`DispatchStore::claim_unbid_alert`] sets it, and nothing clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub vendor_id: Option<Option<Uuid>>,
    pub vendor_name: Option<Option<String>>,
    pub vendor_phone: Option<Option<String>>,
    pub final_price: Option<Option<f64>>,
    pub quoted_price: Option<Option<f64>>,
    pub bidding_open: Option<bool>,
    pub vendor_token: Option<Option<String>>,
    pub customer_token: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub cancelled: Option<bool>,
    pub winning_bid_id: Option<Option<Uuid>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl JobPatch {
    pub fn is_empty(&self) -> bool {
        *self == JobPatch::default()
    }

    pub fn apply(&self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(ref v) = self.vendor_id {
            job.vendor_id = *v;
        }
        if let Some(ref v) = self.vendor_name {
            job.vendor_name = v.clone();
        }
        if let Some(ref v) = self.vendor_phone {
            job.vendor_phone = v.clone();
        }
        if let Some(v) = self.final_price {
            job.final_price = v;
        }
        if let Some(v) = self.quoted_price {
            job.quoted_price = v;
        }
        if let Some(open) = self.bidding_open {
            job.bidding_open = open;
        }
        if let Some(ref v) = self.vendor_token {
            job.vendor_token = v.clone();
        }
        if let Some(ref v) = self.customer_token {
            job.customer_token = v.clone();
        }
        if let Some(ref v) = self.notes {
            job.notes = v.clone();
        }
        if let Some(priority) = self.priority {
            job.priority = priority;
        }
        if let Some(cancelled) = self.cancelled {
            job.cancelled = cancelled;
        }
        if let Some(v) = self.winning_bid_id {
            job.winning_bid_id = v;
        }
        if let Some(v) = self.completed_at {
            job.completed_at = v;
        }
    }
}

/// Which of a job's capabilities a revocation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeScope {
    /// Tokens no longer held by the job record, evaluated atomically with
    /// the revocation.
    Superseded,
    Role(CapabilityRole),
    All,
}

/// Candidate selection for the unbid monitor.
#[derive(Debug, Clone, Copy)]
pub struct UnbidQuery {
    /// Only jobs created at or before this instant.
    pub created_before: DateTime<Utc>,
    pub limit: usize,
}

#[async_trait]
pub trait DispatchStore: Send + Sync {
    async fn insert_job(&self, job: Job) -> Result<()>;

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>>;

    /// All jobs, oldest first.
    async fn list_jobs(&self) -> Result<Vec<Job>>;

    /// Apply `patch` to job `id` only if it still satisfies `guard`.
    /// Returns the updated job, or `None` when nothing matched.
    async fn compare_and_swap(
        &self,
        id: Uuid,
        guard: &JobGuard,
        patch: &JobPatch,
    ) -> Result<Option<Job>>;

    /// Unassigned, uncancelled, open, unalerted, bid-less jobs, oldest first.
    async fn unbid_candidates(&self, query: &UnbidQuery) -> Result<Vec<Job>>;

    /// Append `bid` only if its job still satisfies `guard`.
    async fn append_bid(&self, bid: Bid, guard: &JobGuard) -> Result<bool>;

    async fn get_bid(&self, id: Uuid) -> Result<Option<Bid>>;

    /// Bids for a job in submission order.
    async fn bids_for_job(&self, job_id: Uuid) -> Result<Vec<Bid>>;

    async fn count_bids(&self, job_id: Uuid) -> Result<usize>;

    async fn put_capability(&self, capability: Capability) -> Result<()>;

    async fn get_capability(&self, token: &str) -> Result<Option<Capability>>;

    /// Revoke the job's capabilities selected by `scope`. Returns how many
    /// were revoked.
    async fn revoke_capabilities(&self, job_id: Uuid, scope: RevokeScope) -> Result<usize>;

    async fn find_vendor_by_phone(&self, phone: &str) -> Result<Option<Vendor>>;

    /// Insert `vendor` unless its phone is already known; returns the
    /// canonical record either way.
    async fn upsert_vendor(&self, vendor: Vendor) -> Result<Vendor>;

    async fn list_vendors(&self) -> Result<Vec<Vendor>>;

    /// Claim the job's unbid alert and persist `alert` as one write: stamps
    /// `unbidAlertSentAt = alert.created_at` and stores the alert only if the
    /// job is still unclaimed. Returns the claimed job, or `None` when another
    /// monitor won. Either both records change or neither does.
    async fn claim_unbid_alert(&self, alert: Alert) -> Result<Option<Job>>;

    async fn list_alerts(&self) -> Result<Vec<Alert>>;
}
