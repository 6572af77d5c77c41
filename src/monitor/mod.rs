//! Escalation of jobs that sit open without any bids.
//!
//! Each tick pulls a bounded batch of aged candidates, re-checks each one
//! against fresh state, then claims `unbidAlertSentAt` and stores the alert
//! in one conditional write. Only the claim decides who alerts: any number of monitors, in this
//! process or others, may scan the same jobs and at most one alert per job
//! results.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::error::{DispatchError, Result};
use crate::model::{Alert, Job};
use crate::store::{DispatchStore, UnbidQuery};

pub mod dispatcher;
pub mod scheduler;

pub use dispatcher::{AlertDispatcher, ChannelDispatcher, LogDispatcher};
pub use scheduler::MonitorScheduler;

/// Counters for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// Candidates returned by the store query.
    pub scanned: usize,
    /// Claims won, alerts created.
    pub alerted: usize,
    /// Dropped by the per-candidate re-check.
    pub skipped: usize,
    /// Claim lost to another monitor.
    pub lost_claims: usize,
    /// Candidates whose processing errored.
    pub failed: usize,
}

enum Outcome {
    Alerted,
    Skipped(&'static str),
    LostClaim,
}

pub struct UnbidMonitor {
    store: Arc<dyn DispatchStore>,
    dispatcher: Arc<dyn AlertDispatcher>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
}

impl UnbidMonitor {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        dispatcher: Arc<dyn AlertDispatcher>,
        clock: Arc<dyn Clock>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            config,
        }
    }

    /// Run one scan. Only an unusable grace window or the candidate query can
    /// fail the tick; errors on individual jobs are logged and counted in
    /// [`TickReport::failed`].
    pub async fn tick(&self) -> Result<TickReport> {
        let now = self.clock.now();
        let cutoff = self
            .config
            .grace_window()
            .and_then(|grace| now.checked_sub_signed(grace))
            .ok_or_else(|| {
                DispatchError::Internal(format!(
                    "grace window of {} minutes is out of range",
                    self.config.grace_minutes
                ))
            })?;
        let candidates = self
            .store
            .unbid_candidates(&UnbidQuery {
                created_before: cutoff,
                limit: self.config.batch_limit,
            })
            .await?;

        let mut report = TickReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            let job_id = candidate.id;
            match self.process(candidate, cutoff).await {
                Ok(Outcome::Alerted) => report.alerted += 1,
                Ok(Outcome::Skipped(why)) => {
                    tracing::debug!(job_id = %job_id, reason = why, "Unbid candidate skipped");
                    report.skipped += 1;
                }
                Ok(Outcome::LostClaim) => {
                    tracing::debug!(job_id = %job_id, "Unbid alert already claimed elsewhere");
                    report.lost_claims += 1;
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Unbid candidate failed");
                    report.failed += 1;
                }
            }
        }

        if report.scanned > 0 {
            tracing::info!(
                scanned = report.scanned,
                alerted = report.alerted,
                skipped = report.skipped,
                lost_claims = report.lost_claims,
                failed = report.failed,
                "Unbid monitor tick"
            );
        }
        Ok(report)
    }

    async fn process(&self, candidate: Job, cutoff: DateTime<Utc>) -> Result<Outcome> {
        // Fresh read; the batch may be stale by the time we get here.
        let Some(job) = self.store.get_job(candidate.id).await? else {
            return Ok(Outcome::Skipped("job disappeared"));
        };
        if let Some(why) = skip_reason(&job, cutoff) {
            return Ok(Outcome::Skipped(why));
        }
        if self.store.count_bids(job.id).await? > 0 {
            return Ok(Outcome::Skipped("bid arrived"));
        }

        let now = self.clock.now();
        let waited = (now - job.created_at).num_minutes();
        let alert = Alert::unbid(&job, waited, now);
        // Claim and alert row land together; a failed write leaves the job
        // unclaimed for the next tick.
        let Some(job) = self.store.claim_unbid_alert(alert.clone()).await? else {
            return Ok(Outcome::LostClaim);
        };

        self.dispatcher.dispatch(&alert).await?;
        tracing::warn!(job_id = %job.id, alert_id = %alert.id, waited_minutes = waited, "Unbid alert raised");
        Ok(Outcome::Alerted)
    }
}

fn skip_reason(job: &Job, cutoff: DateTime<Utc>) -> Option<&'static str> {
    if job.vendor_id.is_some() {
        Some("vendor assigned")
    } else if job.cancelled {
        Some("cancelled")
    } else if !job.bidding_open {
        Some("bidding closed")
    } else if job.created_at > cutoff {
        Some("inside grace window")
    } else if job.unbid_alert_sent_at.is_some() {
        Some("already alerted")
    } else {
        None
    }
}
