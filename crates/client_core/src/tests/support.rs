use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{normalize_driver, Metrics, Vehicle, VehicleId, VehicleStatus};
use tokio::sync::{Notify, Semaphore};

use crate::{client::FleetApi, error::ClientError};

pub(crate) fn vehicle(
    id: &str,
    status: VehicleStatus,
    driver: Option<&str>,
    updated_secs: i64,
) -> Vehicle {
    Vehicle {
        id: VehicleId::from(id),
        status,
        location: "Oakland, CA".to_string(),
        driver: driver.map(str::to_string),
        earnings_today: 100.5,
        rides_today: 4,
        updated_at: DateTime::from_timestamp(1_700_000_000 + updated_secs, 0).expect("timestamp"),
    }
}

#[derive(Default)]
struct FakeState {
    vehicles: Vec<Vehicle>,
    fetch_error: Option<String>,
    mutation_error: Option<String>,
    fetch_calls: usize,
    status_calls: Vec<(VehicleId, VehicleStatus)>,
    assign_calls: Vec<(VehicleId, Option<String>)>,
}

/// In-memory `FleetApi` that records every call. Fetches and the mutations
/// of one chosen vehicle can be held at a gate until the test releases them.
pub(crate) struct FakeFleetApi {
    state: Mutex<FakeState>,
    gate_fetches: AtomicBool,
    fetch_gate: Semaphore,
    fetch_started: Notify,
    gated_vehicle: Mutex<Option<VehicleId>>,
    mutation_gate: Semaphore,
    mutation_started: Notify,
}

impl FakeFleetApi {
    pub(crate) fn new(vehicles: Vec<Vehicle>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                vehicles,
                ..FakeState::default()
            }),
            gate_fetches: AtomicBool::new(false),
            fetch_gate: Semaphore::new(0),
            fetch_started: Notify::new(),
            gated_vehicle: Mutex::new(None),
            mutation_gate: Semaphore::new(0),
            mutation_started: Notify::new(),
        }
    }

    pub(crate) fn hold_fetches(&self) {
        self.gate_fetches.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_fetches(&self, count: usize) {
        self.fetch_gate.add_permits(count);
    }

    pub(crate) async fn fetch_started(&self) {
        self.fetch_started.notified().await;
    }

    pub(crate) fn hold_mutations_for(&self, vehicle_id: &VehicleId) {
        *self.gated_vehicle.lock().expect("gate") = Some(vehicle_id.clone());
    }

    pub(crate) fn release_mutations(&self, count: usize) {
        self.mutation_gate.add_permits(count);
    }

    pub(crate) async fn mutation_started(&self) {
        self.mutation_started.notified().await;
    }

    pub(crate) fn fail_fetches(&self, message: Option<&str>) {
        self.state.lock().expect("state").fetch_error = message.map(str::to_string);
    }

    pub(crate) fn fail_mutations(&self, message: Option<&str>) {
        self.state.lock().expect("state").mutation_error = message.map(str::to_string);
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.state.lock().expect("state").fetch_calls
    }

    pub(crate) fn status_calls(&self) -> Vec<(VehicleId, VehicleStatus)> {
        self.state.lock().expect("state").status_calls.clone()
    }

    pub(crate) fn assign_calls(&self) -> Vec<(VehicleId, Option<String>)> {
        self.state.lock().expect("state").assign_calls.clone()
    }

    async fn wait_for_mutation_gate(&self, vehicle_id: &VehicleId) {
        self.mutation_started.notify_one();
        let gated = self.gated_vehicle.lock().expect("gate").as_ref() == Some(vehicle_id);
        if gated {
            self.mutation_gate.acquire().await.expect("gate").forget();
        }
    }

    fn mutate(
        &self,
        vehicle_id: &VehicleId,
        path: String,
        change: impl FnOnce(&mut Vehicle),
    ) -> Result<Vehicle, ClientError> {
        let mut state = self.state.lock().expect("state");
        if let Some(message) = state.mutation_error.clone() {
            return Err(ClientError::Server {
                status: 500,
                path,
                message,
            });
        }
        let Some(vehicle) = state.vehicles.iter_mut().find(|v| &v.id == vehicle_id) else {
            return Err(ClientError::NotFound {
                path,
                message: "Vehicle not found".to_string(),
            });
        };
        change(vehicle);
        vehicle.updated_at = Utc::now();
        Ok(vehicle.clone())
    }
}

#[async_trait]
impl FleetApi for FakeFleetApi {
    async fn fetch_metrics(&self) -> Result<Metrics, ClientError> {
        let state = self.state.lock().expect("state");
        let count = |status: VehicleStatus| {
            state.vehicles.iter().filter(|v| v.status == status).count() as u32
        };
        Ok(Metrics {
            total: state.vehicles.len() as u32,
            available: count(VehicleStatus::Available),
            in_ride: count(VehicleStatus::InRide),
            maintenance: count(VehicleStatus::Maintenance),
            utilization_pct: 0.0,
            total_rides_today: state.vehicles.iter().map(|v| u64::from(v.rides_today)).sum(),
            total_earnings_today: state.vehicles.iter().map(|v| v.earnings_today).sum(),
        })
    }

    async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>, ClientError> {
        self.state.lock().expect("state").fetch_calls += 1;
        self.fetch_started.notify_one();
        if self.gate_fetches.load(Ordering::SeqCst) {
            self.fetch_gate.acquire().await.expect("gate").forget();
        }

        let state = self.state.lock().expect("state");
        match &state.fetch_error {
            Some(message) => Err(ClientError::Server {
                status: 500,
                path: "/vehicles".to_string(),
                message: message.clone(),
            }),
            None => Ok(state.vehicles.clone()),
        }
    }

    async fn set_vehicle_status(
        &self,
        vehicle_id: &VehicleId,
        status: VehicleStatus,
    ) -> Result<Vehicle, ClientError> {
        self.state
            .lock()
            .expect("state")
            .status_calls
            .push((vehicle_id.clone(), status));
        self.wait_for_mutation_gate(vehicle_id).await;
        self.mutate(vehicle_id, format!("/vehicles/{vehicle_id}/status"), |v| {
            v.status = status;
        })
    }

    async fn assign_driver(
        &self,
        vehicle_id: &VehicleId,
        driver: Option<&str>,
    ) -> Result<Vehicle, ClientError> {
        let driver = normalize_driver(driver);
        self.state
            .lock()
            .expect("state")
            .assign_calls
            .push((vehicle_id.clone(), driver.clone()));
        self.wait_for_mutation_gate(vehicle_id).await;
        self.mutate(vehicle_id, format!("/vehicles/{vehicle_id}/assign"), |v| {
            v.driver = driver;
        })
    }
}
