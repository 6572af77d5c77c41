use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DispatchError, Result};
use crate::model::address::{Address, AddressInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Unassigned,
    Assigned,
    OnTheWay,
    Arrived,
    Completed,
}

impl JobStatus {
    /// Position in the dispatch lifecycle, Unassigned first.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Unassigned => 0,
            JobStatus::Assigned => 1,
            JobStatus::OnTheWay => 2,
            JobStatus::Arrived => 3,
            JobStatus::Completed => 4,
        }
    }

    /// The strictly adjacent forward state, if any.
    pub fn next(self) -> Option<JobStatus> {
        match self {
            JobStatus::Unassigned => Some(JobStatus::Assigned),
            JobStatus::Assigned => Some(JobStatus::OnTheWay),
            JobStatus::OnTheWay => Some(JobStatus::Arrived),
            JobStatus::Arrived => Some(JobStatus::Completed),
            JobStatus::Completed => None,
        }
    }

    /// Every status except Unassigned requires a vendor on the job.
    pub fn requires_vendor(self) -> bool {
        self != JobStatus::Unassigned
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Unassigned => write!(f, "Unassigned"),
            JobStatus::Assigned => write!(f, "Assigned"),
            JobStatus::OnTheWay => write!(f, "OnTheWay"),
            JobStatus::Arrived => write!(f, "Arrived"),
            JobStatus::Completed => write!(f, "Completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidMode {
    Fixed,
    #[default]
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub vendor_name: Option<String>,
    pub vendor_phone: Option<String>,
    pub status: JobStatus,
    pub bid_mode: BidMode,
    pub bidding_open: bool,
    /// Capability credentials; never rendered in job payloads.
    #[serde(skip)]
    pub vendor_token: Option<String>,
    #[serde(skip)]
    pub customer_token: Option<String>,
    pub quoted_price: Option<f64>,
    pub final_price: Option<f64>,
    pub currency: String,
    pub pickup_address: Address,
    pub dropoff_address: Option<Address>,
    pub service_type: String,
    pub notes: Option<String>,
    pub priority: Priority,
    pub cancelled: bool,
    pub winning_bid_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub unbid_alert_sent_at: Option<DateTime<Utc>>,
}

/// Intake payload for a new job. Every field is optional at the wire level
/// so missing input surfaces as a validation error rather than a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    pub customer_id: Option<Uuid>,
    pub service_type: Option<String>,
    pub pickup_address: Option<AddressInput>,
    pub dropoff_address: Option<AddressInput>,
    pub bid_mode: Option<BidMode>,
    pub quoted_price: Option<f64>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub priority: Option<Priority>,
}

impl JobDraft {
    pub fn new(service_type: impl Into<String>, pickup: impl Into<String>) -> Self {
        Self {
            service_type: Some(service_type.into()),
            pickup_address: Some(AddressInput::Text(pickup.into())),
            ..Default::default()
        }
    }

    pub fn with_bid_mode(mut self, mode: BidMode) -> Self {
        self.bid_mode = Some(mode);
        self
    }

    pub fn with_quote(mut self, price: f64) -> Self {
        self.quoted_price = Some(price);
        self
    }
}

pub(crate) fn validate_price(field: &str, price: f64) -> Result<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(DispatchError::Validation(format!(
            "{} must be a non-negative number",
            field
        )));
    }
    Ok(price)
}

pub(crate) fn non_empty(field: &str, value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DispatchError::Validation(format!("{} is required", field))),
    }
}

impl Job {
    /// Build an Unassigned job from an intake draft.
    pub fn from_draft(draft: JobDraft, now: DateTime<Utc>) -> Result<Self> {
        let service_type = non_empty("serviceType", draft.service_type)?;
        let pickup_address = match draft.pickup_address {
            Some(input) => Address::from_input(input)?,
            None => {
                return Err(DispatchError::Validation(
                    "pickupAddress is required".to_string(),
                ))
            }
        };
        let dropoff_address = draft.dropoff_address.map(Address::from_input).transpose()?;
        let quoted_price = draft
            .quoted_price
            .map(|p| validate_price("quotedPrice", p))
            .transpose()?;
        let bid_mode = draft.bid_mode.unwrap_or_default();
        if bid_mode == BidMode::Fixed && quoted_price.is_none() {
            return Err(DispatchError::Validation(
                "quotedPrice is required for fixed bid mode".to_string(),
            ));
        }
        let currency = draft
            .currency
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "USD".to_string());

        Ok(Self {
            id: Uuid::new_v4(),
            customer_id: draft.customer_id.unwrap_or_else(Uuid::new_v4),
            vendor_id: None,
            vendor_name: None,
            vendor_phone: None,
            status: JobStatus::Unassigned,
            bid_mode,
            bidding_open: false,
            vendor_token: None,
            customer_token: None,
            quoted_price,
            final_price: None,
            currency,
            pickup_address,
            dropoff_address,
            service_type,
            notes: draft.notes.filter(|n| !n.trim().is_empty()),
            priority: draft.priority.unwrap_or_default(),
            cancelled: false,
            winning_bid_id: None,
            created_at: now,
            completed_at: None,
            unbid_alert_sent_at: None,
        })
    }

    /// True while vendors may still bid on this job.
    pub fn is_open_for_bids(&self) -> bool {
        self.bidding_open && self.status == JobStatus::Unassigned && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_adjacency() {
        assert_eq!(JobStatus::Unassigned.next(), Some(JobStatus::Assigned));
        assert_eq!(JobStatus::Arrived.next(), Some(JobStatus::Completed));
        assert_eq!(JobStatus::Completed.next(), None);
        assert!(JobStatus::OnTheWay.rank() > JobStatus::Assigned.rank());
        assert!(!JobStatus::Unassigned.requires_vendor());
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_string(&JobStatus::OnTheWay).unwrap(),
            "\"OnTheWay\""
        );
        let parsed: JobStatus = serde_json::from_str("\"Arrived\"").unwrap();
        assert_eq!(parsed, JobStatus::Arrived);
        assert_eq!(JobStatus::Unassigned.to_string(), "Unassigned");
    }

    #[test]
    fn draft_defaults() {
        let job = Job::from_draft(JobDraft::new("Towing", "123 Main St"), Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Unassigned);
        assert_eq!(job.bid_mode, BidMode::Open);
        assert_eq!(job.currency, "USD");
        assert_eq!(job.priority, Priority::Normal);
        assert!(!job.bidding_open);
        assert!(job.vendor_id.is_none());
        assert!(job.unbid_alert_sent_at.is_none());
    }

    #[test]
    fn draft_requires_service_type_and_pickup() {
        let draft = JobDraft {
            pickup_address: Some(AddressInput::Text("1 Elm".to_string())),
            ..Default::default()
        };
        assert!(matches!(
            Job::from_draft(draft, Utc::now()),
            Err(DispatchError::Validation(_))
        ));

        let draft = JobDraft {
            service_type: Some("Towing".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Job::from_draft(draft, Utc::now()),
            Err(DispatchError::Validation(_))
        ));
    }

    #[test]
    fn fixed_mode_needs_quote() {
        let draft = JobDraft::new("Lockout", "9 Oak Ave").with_bid_mode(BidMode::Fixed);
        assert!(Job::from_draft(draft, Utc::now()).is_err());

        let draft = JobDraft::new("Lockout", "9 Oak Ave")
            .with_bid_mode(BidMode::Fixed)
            .with_quote(85.0);
        let job = Job::from_draft(draft, Utc::now()).unwrap();
        assert_eq!(job.quoted_price, Some(85.0));
    }

    #[test]
    fn tokens_are_not_serialized() {
        let mut job = Job::from_draft(JobDraft::new("Towing", "1 A St"), Utc::now()).unwrap();
        job.vendor_token = Some("secret-v".to_string());
        job.customer_token = Some("secret-c".to_string());
        let json = serde_json::to_string(&job).unwrap();
        assert!(!json.contains("secret-v"));
        assert!(!json.contains("secret-c"));
        assert!(json.contains("\"biddingOpen\":false"));
    }
}
