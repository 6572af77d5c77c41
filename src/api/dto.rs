use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::Assignment;
use crate::model::{Address, Bid, BidMode, Job, JobStatus};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidCreated {
    pub bid_id: Uuid,
}

impl From<&Bid> for BidCreated {
    fn from(bid: &Bid) -> Self {
        Self { bid_id: bid.id }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub ok: bool,
    pub job_id: Uuid,
    pub bid_id: Uuid,
    pub vendor_id: Uuid,
    pub final_price: Option<f64>,
}

impl From<&Assignment> for SelectionResponse {
    fn from(assignment: &Assignment) -> Self {
        Self {
            ok: true,
            job_id: assignment.job.id,
            bid_id: assignment.bid.id,
            vendor_id: assignment.vendor.id,
            final_price: assignment.job.final_price,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSelectRequest {
    pub bid_id: Option<String>,
}

/// What the status-tracking link shows. No prices, tokens or customer ids.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub service_type: String,
    pub vendor_name: Option<String>,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for StatusView {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            service_type: job.service_type,
            vendor_name: job.vendor_name,
            cancelled: job.cancelled,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

/// Job summary behind a vendor bid link.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorJobView {
    pub job_id: Uuid,
    pub service_type: String,
    pub pickup_address: Address,
    pub dropoff_address: Option<Address>,
    pub notes: Option<String>,
    pub bid_mode: BidMode,
    pub quoted_price: Option<f64>,
    pub currency: String,
    pub bidding_open: bool,
}

impl From<Job> for VendorJobView {
    fn from(job: Job) -> Self {
        let bidding_open = job.is_open_for_bids();
        Self {
            job_id: job.id,
            service_type: job.service_type,
            pickup_address: job.pickup_address,
            dropoff_address: job.dropoff_address,
            notes: job.notes,
            bid_mode: job.bid_mode,
            quoted_price: job.quoted_price,
            currency: job.currency,
            bidding_open,
        }
    }
}
