//! Bidding and assignment engine.
//!
//! [`DispatchEngine`] owns no mutable state of its own. Every mutation is a
//! conditional write against the [`DispatchStore`], so any number of engine
//! instances (in one process or many) can serve the same records.
//!
//! # Components
//!
//! - [`tokens`]: opens bidding by minting vendor/customer capabilities
//! - [`ledger`]: accepts bids against an open vendor capability
//! - [`assigner`]: picks one winning bid with a single conditional write
//! - [`transitions`]: validated status changes, manual assignment, cancellation

use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{DispatchError, Result};
use crate::events::DispatchEvent;
use crate::model::{Alert, Job, JobDraft, Vendor};
use crate::store::DispatchStore;

pub mod assigner;
pub mod ledger;
pub mod tokens;
pub mod transitions;

pub use assigner::{Assignment, Selector};
pub use tokens::{BiddingLinks, LinkBuilder};
pub use transitions::JobUpdate;

const EVENT_CAPACITY: usize = 256;

pub struct DispatchEngine {
    store: Arc<dyn DispatchStore>,
    clock: Arc<dyn Clock>,
    links: LinkBuilder,
    events: broadcast::Sender<DispatchEvent>,
}

impl DispatchEngine {
    pub fn new(store: Arc<dyn DispatchStore>, clock: Arc<dyn Clock>, links: LinkBuilder) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            clock,
            links,
            events,
        }
    }

    /// Receive domain events published after successful writes.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: DispatchEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }

    /// Intake: persist a new Unassigned job.
    pub async fn create_job(&self, draft: JobDraft) -> Result<Job> {
        let job = Job::from_draft(draft, self.clock.now())?;
        self.store.insert_job(job.clone()).await?;
        tracing::info!(
            job_id = %job.id,
            service_type = %job.service_type,
            bid_mode = ?job.bid_mode,
            "Job created"
        );
        Ok(job)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Job> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("job {}", job_id)))
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.store.list_jobs().await
    }

    pub async fn list_alerts(&self) -> Result<Vec<Alert>> {
        self.store.list_alerts().await
    }

    pub async fn list_vendors(&self) -> Result<Vec<Vendor>> {
        self.store.list_vendors().await
    }
}
