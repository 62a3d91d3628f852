//! Client-side data sync for the fleet dashboard.
//!
//! [`client::HttpFleetClient`] talks to the backend, [`refresh::RefreshController`]
//! keeps the vehicle list current, [`row_actions::RowActionController`] issues
//! per-row mutations and [`presentation`] turns the held state into text.
//! Controllers publish [`DashboardEvent`]s on a shared broadcast channel so a
//! view can re-render whenever something changes.

use chrono::{DateTime, Utc};
use shared::domain::VehicleId;

pub mod client;
pub mod config;
pub mod error;
pub mod presentation;
pub mod refresh;
pub mod row_actions;

pub use client::{FleetApi, HttpFleetClient};
pub use config::{load_settings, CallOrigin, ClientSettings, ConfigError};
pub use error::ClientError;
pub use refresh::{
    RefreshController, RefreshOutcome, RefreshPhase, RefreshSnapshot, RefreshTrigger,
};
pub use row_actions::{ActionOutcome, RowActionController, RowSnapshot, SkipReason};

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    VehiclesUpdated { count: usize, at: DateTime<Utc> },
    RefreshFailed(String),
    RefreshPhaseChanged(RefreshPhase),
    ActionFailed { vehicle_id: VehicleId, message: String },
    RowBusyChanged { vehicle_id: VehicleId, busy: bool },
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
