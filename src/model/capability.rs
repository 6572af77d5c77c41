use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use uuid::Uuid;

/// Entropy per minted token.
pub const TOKEN_BYTES: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityRole {
    /// May submit bids.
    Vendor,
    /// May list bids and select a winner.
    Customer,
}

impl std::fmt::Display for CapabilityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityRole::Vendor => write!(f, "vendor"),
            CapabilityRole::Customer => write!(f, "customer"),
        }
    }
}

/// Bearer credential scoped to one job and one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub token: String,
    pub job_id: Uuid,
    pub role: CapabilityRole,
    pub issued_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Capability {
    pub fn mint(job_id: Uuid, role: CapabilityRole, issued_at: DateTime<Utc>) -> Self {
        Self {
            token: mint_token(),
            job_id,
            role,
            issued_at,
            revoked: false,
        }
    }
}

/// Random URL-safe token drawn from the OS RNG.
pub fn mint_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
