use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::address::Coordinate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorCapabilities {
    pub towing: bool,
    pub jump_start: bool,
    pub lockout: bool,
    pub tire_change: bool,
    pub fuel_delivery: bool,
}

/// Canonical vendor record. `phone` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub city: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub service_radius_km: Option<f64>,
    pub capabilities: VendorCapabilities,
    pub created_at: DateTime<Utc>,
}

impl Vendor {
    /// Minimal record created the first time a phone number wins a job.
    pub fn shell(id: Uuid, name: String, phone: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            phone,
            city: None,
            coordinate: None,
            service_radius_km: None,
            capabilities: VendorCapabilities::default(),
            created_at,
        }
    }
}

/// Reduce a phone number to its digits, keeping a leading `+`.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    if trimmed.starts_with('+') {
        Some(format!("+{}", digits))
    } else {
        Some(digits)
    }
}
