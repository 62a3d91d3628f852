//! Per-row mutations: status changes and driver assignment.
//!
//! Busy state is tracked per vehicle id, so an in-flight request on one row
//! never blocks another row. Every failure is logged and published as an
//! event; none propagates to the caller.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::domain::{Vehicle, VehicleId, VehicleStatus};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::{
    client::FleetApi,
    error::ClientError,
    refresh::{RefreshController, RefreshTrigger},
    DashboardEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The vehicle already has the requested status.
    Unchanged,
    /// A request for the same vehicle is still in flight.
    RowBusy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Applied(Vehicle),
    Skipped(SkipReason),
    Failed(String),
}

/// Busy ids and drafts, copied out for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSnapshot {
    pub busy: HashSet<VehicleId>,
    pub drafts: HashMap<VehicleId, String>,
}

impl RowSnapshot {
    pub fn is_busy(&self, vehicle_id: &VehicleId) -> bool {
        self.busy.contains(vehicle_id)
    }

    pub fn draft(&self, vehicle_id: &VehicleId) -> &str {
        self.drafts.get(vehicle_id).map(String::as_str).unwrap_or("")
    }
}

#[derive(Default)]
struct RowState {
    busy: HashSet<VehicleId>,
    drafts: HashMap<VehicleId, String>,
}

pub struct RowActionController {
    api: Arc<dyn FleetApi>,
    refresher: Arc<RefreshController>,
    state: Mutex<RowState>,
    events: broadcast::Sender<DashboardEvent>,
}

impl RowActionController {
    pub fn new(api: Arc<dyn FleetApi>, refresher: Arc<RefreshController>) -> Arc<Self> {
        let events = refresher.event_sender();
        Arc::new(Self {
            api,
            refresher,
            state: Mutex::new(RowState::default()),
            events,
        })
    }

    pub async fn set_status(&self, vehicle_id: &VehicleId, status: VehicleStatus) -> ActionOutcome {
        let current = self.refresher.vehicle(vehicle_id).map(|vehicle| vehicle.status);
        if current == Some(status) {
            debug!(vehicle_id = %vehicle_id, %status, "row: status unchanged, nothing sent");
            return ActionOutcome::Skipped(SkipReason::Unchanged);
        }

        let Some(busy) = self.mark_busy(vehicle_id) else {
            return ActionOutcome::Skipped(SkipReason::RowBusy);
        };
        let result = self.api.set_vehicle_status(vehicle_id, status).await;
        drop(busy);

        self.finish(vehicle_id, "set_status", result).await
    }

    /// Commits the draft for `vehicle_id`. A blank draft unassigns.
    pub async fn save_driver(&self, vehicle_id: &VehicleId) -> ActionOutcome {
        let draft = self.draft(vehicle_id);
        let driver = draft.trim();
        let driver = (!driver.is_empty()).then_some(driver);

        let Some(busy) = self.mark_busy(vehicle_id) else {
            return ActionOutcome::Skipped(SkipReason::RowBusy);
        };
        let result = self.api.assign_driver(vehicle_id, driver).await;
        drop(busy);

        self.finish(vehicle_id, "save_driver", result).await
    }

    /// Unassigns the driver whatever the draft says, then empties the draft.
    pub async fn clear_driver(&self, vehicle_id: &VehicleId) -> ActionOutcome {
        let Some(busy) = self.mark_busy(vehicle_id) else {
            return ActionOutcome::Skipped(SkipReason::RowBusy);
        };
        let result = self.api.assign_driver(vehicle_id, None).await;
        if result.is_ok() {
            self.lock_state()
                .drafts
                .insert(vehicle_id.clone(), String::new());
        }
        drop(busy);

        self.finish(vehicle_id, "clear_driver", result).await
    }

    /// Local edit of the driver input. Allowed while the row is busy.
    pub fn update_draft(&self, vehicle_id: &VehicleId, text: impl Into<String>) {
        self.lock_state()
            .drafts
            .insert(vehicle_id.clone(), text.into());
    }

    pub fn draft(&self, vehicle_id: &VehicleId) -> String {
        self.lock_state()
            .drafts
            .get(vehicle_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_busy(&self, vehicle_id: &VehicleId) -> bool {
        self.lock_state().busy.contains(vehicle_id)
    }

    pub fn snapshot(&self) -> RowSnapshot {
        let state = self.lock_state();
        RowSnapshot {
            busy: state.busy.clone(),
            drafts: state.drafts.clone(),
        }
    }

    async fn finish(
        &self,
        vehicle_id: &VehicleId,
        action: &'static str,
        result: Result<Vehicle, ClientError>,
    ) -> ActionOutcome {
        match result {
            Ok(vehicle) => {
                info!(vehicle_id = %vehicle_id, action, "row: mutation applied");
                self.refresher.refresh(RefreshTrigger::Mutation).await;
                ActionOutcome::Applied(vehicle)
            }
            Err(err) => {
                let message = err.to_string();
                error!(
                    vehicle_id = %vehicle_id,
                    action,
                    status = ?err.status(),
                    error = %message,
                    "row: mutation failed"
                );
                let _ = self.events.send(DashboardEvent::ActionFailed {
                    vehicle_id: vehicle_id.clone(),
                    message: message.clone(),
                });
                ActionOutcome::Failed(message)
            }
        }
    }

    fn mark_busy(&self, vehicle_id: &VehicleId) -> Option<BusyRow<'_>> {
        if !self.lock_state().busy.insert(vehicle_id.clone()) {
            debug!(vehicle_id = %vehicle_id, "row: busy, action ignored");
            return None;
        }
        let _ = self.events.send(DashboardEvent::RowBusyChanged {
            vehicle_id: vehicle_id.clone(),
            busy: true,
        });
        Some(BusyRow {
            controller: self,
            vehicle_id: vehicle_id.clone(),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, RowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the busy flag for its row on drop, whatever the request outcome.
struct BusyRow<'a> {
    controller: &'a RowActionController,
    vehicle_id: VehicleId,
}

impl Drop for BusyRow<'_> {
    fn drop(&mut self) {
        self.controller.lock_state().busy.remove(&self.vehicle_id);
        let _ = self.controller.events.send(DashboardEvent::RowBusyChanged {
            vehicle_id: self.vehicle_id.clone(),
            busy: false,
        });
    }
}

#[cfg(test)]
#[path = "tests/row_actions_tests.rs"]
mod tests;
