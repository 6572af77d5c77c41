use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DispatchError, Result};
use crate::model::job::{non_empty, validate_price};
use crate::model::vendor::normalize_phone;

/// A vendor's price/ETA offer. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: Uuid,
    pub job_id: Uuid,
    pub vendor_name: String,
    pub vendor_phone: String,
    pub price: f64,
    pub eta_minutes: u32,
    pub created_at: DateTime<Utc>,
}

/// Bid form as submitted through a vendor link.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidSubmission {
    pub vendor_name: Option<String>,
    pub vendor_phone: Option<String>,
    pub eta_minutes: Option<i64>,
    pub price: Option<f64>,
}

impl BidSubmission {
    pub fn new(vendor_name: &str, vendor_phone: &str, price: f64, eta_minutes: i64) -> Self {
        Self {
            vendor_name: Some(vendor_name.to_string()),
            vendor_phone: Some(vendor_phone.to_string()),
            eta_minutes: Some(eta_minutes),
            price: Some(price),
        }
    }

    /// Validate the form and turn it into a bid row for `job_id`.
    pub fn into_bid(self, job_id: Uuid, now: DateTime<Utc>) -> Result<Bid> {
        let vendor_name = non_empty("vendorName", self.vendor_name)?;
        let raw_phone = non_empty("vendorPhone", self.vendor_phone)?;
        let vendor_phone = normalize_phone(&raw_phone).ok_or_else(|| {
            DispatchError::Validation("vendorPhone must contain digits".to_string())
        })?;

        let eta_minutes = match self.eta_minutes {
            Some(eta) if eta > 0 => u32::try_from(eta).map_err(|_| {
                DispatchError::Validation("etaMinutes is too large".to_string())
            })?,
            Some(_) => {
                return Err(DispatchError::Validation(
                    "etaMinutes must be greater than zero".to_string(),
                ))
            }
            None => {
                return Err(DispatchError::Validation(
                    "etaMinutes is required".to_string(),
                ))
            }
        };

        let price = match self.price {
            Some(p) => validate_price("price", p)?,
            None => return Err(DispatchError::Validation("price is required".to_string())),
        };

        Ok(Bid {
            id: Uuid::new_v4(),
            job_id,
            vendor_name,
            vendor_phone,
            price,
            eta_minutes,
            created_at: now,
        })
    }
}
