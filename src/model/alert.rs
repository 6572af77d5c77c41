use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::job::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

/// Routing hints for the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMeta {
    pub role: String,
    pub kind: String,
    pub route: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub job_id: Uuid,
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub meta: AlertMeta,
    pub created_at: DateTime<Utc>,
}

pub const UNBID_ALERT_KIND: &str = "unbid_job";

impl Alert {
    /// Escalation raised when `job` has sat without bids past the grace window.
    pub fn unbid(job: &Job, waited_minutes: i64, now: DateTime<Utc>) -> Self {
        let severity = if job.priority >= crate::model::Priority::High {
            Severity::Critical
        } else {
            Severity::Warning
        };
        Self {
            id: Uuid::new_v4(),
            job_id: job.id,
            title: format!("No bids on {} job", job.service_type),
            body: format!(
                "{} at {} has received no bids after {} minutes",
                job.service_type, job.pickup_address.label, waited_minutes
            ),
            severity,
            meta: AlertMeta {
                role: "admin".to_string(),
                kind: UNBID_ALERT_KIND.to_string(),
                route: format!("/jobs/{}", job.id),
            },
            created_at: now,
        }
    }
}
