use serde::Deserialize;
use uuid::Uuid;

use crate::engine::DispatchEngine;
use crate::error::{DispatchError, RejectReason, Result};
use crate::events::DispatchEvent;
use crate::lifecycle::{check_transition, Edge, Requester, TransitionRequest};
use crate::model::job::validate_price;
use crate::model::{normalize_phone, Job, JobStatus, Priority};
use crate::store::{JobGuard, JobPatch, RevokeScope};

/// PATCH body for a job. Absent fields are left alone; an empty `notes`
/// clears the notes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub notes: Option<String>,
    pub priority: Option<Priority>,
    pub quoted_price: Option<f64>,
    pub final_price: Option<f64>,
    /// Vendor identity, only when the update takes the job out of Unassigned.
    pub vendor_name: Option<String>,
    pub vendor_phone: Option<String>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_vendor(mut self, name: &str, phone: &str) -> Self {
        self.vendor_name = Some(name.to_string());
        self.vendor_phone = Some(phone.to_string());
        self
    }

    fn vendor_identity(&self) -> Result<Option<(String, String)>> {
        let name = self
            .vendor_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let phone = self
            .vendor_phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        match (name, phone) {
            (None, None) => Ok(None),
            (Some(name), Some(phone)) => {
                let phone = normalize_phone(phone).ok_or_else(|| {
                    DispatchError::Validation("vendorPhone must contain digits".to_string())
                })?;
                Ok(Some((name.to_string(), phone)))
            }
            _ => Err(DispatchError::Validation(
                "vendorName and vendorPhone must be given together".to_string(),
            )),
        }
    }
}

impl DispatchEngine {
    /// Apply a PATCH to a job: optional status transition plus field edits,
    /// committed as one conditional write guarded on the status observed
    /// when the request was validated.
    pub async fn update_job(
        &self,
        job_id: Uuid,
        update: JobUpdate,
        requester: Requester,
    ) -> Result<Job> {
        let job = self.get_job(job_id).await?;
        let vendor = update.vendor_identity()?;
        let from = job.status;
        let target = update.status.filter(|to| *to != from);

        let mut patch = self.field_patch(&update, requester)?;
        let mut assigned_vendor = None;

        if let Some(to) = target {
            let edge = check_transition(&TransitionRequest {
                from,
                to,
                requester,
                cancelled: job.cancelled,
                vendor_supplied: vendor.is_some(),
            })
            .map_err(|reasons| {
                tracing::info!(
                    job_id = %job_id,
                    from = %from,
                    to = %to,
                    reasons = ?reasons,
                    "Transition rejected"
                );
                DispatchError::InvalidTransition { from, to, reasons }
            })?;

            patch.status = Some(to);
            if to == JobStatus::Completed {
                patch.completed_at = Some(Some(self.clock.now()));
            }

            if edge == Edge::Unassign {
                patch.vendor_id = Some(None);
                patch.vendor_name = Some(None);
                patch.vendor_phone = Some(None);
                patch.final_price = Some(None);
                patch.winning_bid_id = Some(None);
                patch.bidding_open = Some(false);
            } else if edge.assigns_vendor(from) {
                // check_transition refuses vendor-assigning edges without one
                let (name, phone) = vendor.clone().ok_or_else(|| {
                    DispatchError::Internal("vendor identity missing".to_string())
                })?;
                let vendor_id = self
                    .store
                    .find_vendor_by_phone(&phone)
                    .await?
                    .map(|v| v.id)
                    .unwrap_or_else(Uuid::new_v4);
                patch.vendor_id = Some(Some(vendor_id));
                patch.vendor_name = Some(Some(name.clone()));
                patch.vendor_phone = Some(Some(phone.clone()));
                patch.bidding_open = Some(false);
                assigned_vendor = Some((vendor_id, name, phone));
            } else if vendor.is_some() {
                return Err(DispatchError::Validation(
                    "vendor identity can only be set when assigning".to_string(),
                ));
            }
        } else {
            if vendor.is_some() {
                return Err(DispatchError::Validation(
                    "vendor identity can only be set when assigning".to_string(),
                ));
            }
            if job.cancelled {
                return Err(DispatchError::conflict(
                    "job is cancelled",
                    RejectReason::JobCancelled,
                ));
            }
        }

        if patch.is_empty() {
            return Ok(job);
        }

        let updated = self
            .store
            .compare_and_swap(job_id, &JobGuard::in_status(from), &patch)
            .await?
            .ok_or_else(|| {
                tracing::info!(job_id = %job_id, from = %from, "Job changed concurrently, update refused");
                DispatchError::conflict("job changed concurrently", RejectReason::StaleStatus)
            })?;

        let updated = match assigned_vendor {
            Some((vendor_id, name, phone)) => {
                let (updated, vendor) = self.settle_vendor(updated, vendor_id, &name, &phone).await;
                self.close_vendor_links(job_id).await;
                self.publish(DispatchEvent::JobAssigned {
                    job_id,
                    bid_id: None,
                    vendor_id: vendor.id,
                    vendor_name: vendor.name,
                    vendor_phone: vendor.phone,
                    final_price: updated.final_price,
                });
                updated
            }
            None => updated,
        };

        if let Some(to) = target {
            tracing::info!(job_id = %job_id, from = %from, to = %to, requester = ?requester, "Job status changed");
            self.publish(DispatchEvent::StatusChanged { job_id, from, to });
        }
        Ok(updated)
    }

    fn field_patch(&self, update: &JobUpdate, requester: Requester) -> Result<JobPatch> {
        let mut patch = JobPatch::default();
        if let Some(ref notes) = update.notes {
            let notes = notes.trim();
            patch.notes = Some((!notes.is_empty()).then(|| notes.to_string()));
        }
        if let Some(priority) = update.priority {
            patch.priority = Some(priority);
        }
        if let Some(price) = update.quoted_price {
            patch.quoted_price = Some(Some(validate_price("quotedPrice", price)?));
        }
        if let Some(price) = update.final_price {
            if !requester.is_admin() {
                return Err(DispatchError::conflict(
                    "only an admin may set finalPrice",
                    RejectReason::RequiresAdmin,
                ));
            }
            patch.final_price = Some(Some(validate_price("finalPrice", price)?));
        }
        Ok(patch)
    }

    /// Cancel a job that has not completed. Bidding closes and every link
    /// the job ever handed out is revoked.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<Job> {
        let job = self.get_job(job_id).await?;
        if job.cancelled {
            return Err(DispatchError::conflict(
                "job is already cancelled",
                RejectReason::JobCancelled,
            ));
        }
        if job.status == JobStatus::Completed {
            return Err(DispatchError::conflict(
                "completed jobs cannot be cancelled",
                RejectReason::TerminalState,
            ));
        }

        let patch = JobPatch {
            cancelled: Some(true),
            bidding_open: Some(false),
            ..Default::default()
        };
        let updated = self
            .store
            .compare_and_swap(job_id, &JobGuard::in_status(job.status), &patch)
            .await?
            .ok_or_else(|| {
                DispatchError::conflict("job changed concurrently", RejectReason::StaleStatus)
            })?;

        let revoked = self
            .store
            .revoke_capabilities(job_id, RevokeScope::All)
            .await?;
        tracing::info!(job_id = %job_id, status = %updated.status, revoked, "Job cancelled");
        self.publish(DispatchEvent::JobCancelled { job_id });
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_identity_needs_both_fields() {
        assert!(JobUpdate::default().vendor_identity().unwrap().is_none());

        let update = JobUpdate::status(JobStatus::Assigned).with_vendor("Ace", "(555) 010");
        assert_eq!(
            update.vendor_identity().unwrap(),
            Some(("Ace".to_string(), "555010".to_string()))
        );

        let update = JobUpdate {
            vendor_name: Some("Ace".to_string()),
            ..Default::default()
        };
        assert!(update.vendor_identity().is_err());

        let update = JobUpdate::default().with_vendor("Ace", "none");
        assert!(update.vendor_identity().is_err());
    }
}
