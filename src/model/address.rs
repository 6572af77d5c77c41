//! Address and coordinate value types.
//!
//! Intake payloads spell locations several ways (a bare string, or an object
//! with `label`/`address` and `lat`/`lng`/`latitude`/`longitude`). They are
//! normalized into [`Address`] at the boundary and nothing past intake ever
//! probes the raw shape again.

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(DispatchError::Validation(format!(
                "latitude {} out of range",
                lat
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(DispatchError::Validation(format!(
                "longitude {} out of range",
                lng
            )));
        }
        Ok(Self { lat, lng })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
}

/// Raw wire shapes accepted for an address.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AddressInput {
    Text(String),
    Structured {
        #[serde(default, alias = "address")]
        label: Option<String>,
        #[serde(default, alias = "latitude")]
        lat: Option<f64>,
        #[serde(default, alias = "lon", alias = "longitude")]
        lng: Option<f64>,
    },
}

impl Address {
    pub fn from_input(input: AddressInput) -> Result<Self> {
        let (label, coordinate) = match input {
            AddressInput::Text(text) => (Some(text), None),
            AddressInput::Structured { label, lat, lng } => {
                let coordinate = match (lat, lng) {
                    (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)?),
                    (None, None) => None,
                    _ => {
                        return Err(DispatchError::Validation(
                            "coordinates need both lat and lng".to_string(),
                        ))
                    }
                };
                (label, coordinate)
            }
        };

        let label = label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .or_else(|| coordinate.map(|c| format!("{:.5},{:.5}", c.lat, c.lng)))
            .ok_or_else(|| DispatchError::Validation("address is empty".to_string()))?;

        Ok(Self { label, coordinate })
    }
}
