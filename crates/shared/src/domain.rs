use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    InRide,
    Maintenance,
}

impl VehicleStatus {
    pub const ALL: [VehicleStatus; 3] = [
        VehicleStatus::Available,
        VehicleStatus::InRide,
        VehicleStatus::Maintenance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::InRide => "in_ride",
            VehicleStatus::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown vehicle status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for VehicleStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        VehicleStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub status: VehicleStatus,
    pub location: String,
    pub driver: Option<String>,
    pub earnings_today: f64,
    pub rides_today: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total: u32,
    pub available: u32,
    pub in_ride: u32,
    pub maintenance: u32,
    pub utilization_pct: f64,
    pub total_rides_today: u64,
    pub total_earnings_today: f64,
}

/// Trims a driver name and maps an empty result to `None` (unassigned).
pub fn normalize_driver(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|driver| !driver.is_empty())
        .map(str::to_string)
}
