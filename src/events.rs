use serde::Serialize;
use uuid::Uuid;

use crate::model::JobStatus;

/// Domain events published after a successful write. Messaging and push
/// collaborators subscribe; nothing inside the engine depends on delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    BiddingOpened {
        job_id: Uuid,
    },
    BidSubmitted {
        job_id: Uuid,
        bid_id: Uuid,
    },
    JobAssigned {
        job_id: Uuid,
        bid_id: Option<Uuid>,
        vendor_id: Uuid,
        vendor_name: String,
        vendor_phone: String,
        final_price: Option<f64>,
    },
    StatusChanged {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
    JobCancelled {
        job_id: Uuid,
    },
}

impl DispatchEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            DispatchEvent::BiddingOpened { job_id }
            | DispatchEvent::BidSubmitted { job_id, .. }
            | DispatchEvent::JobAssigned { job_id, .. }
            | DispatchEvent::StatusChanged { job_id, .. }
            | DispatchEvent::JobCancelled { job_id } => *job_id,
        }
    }
}
