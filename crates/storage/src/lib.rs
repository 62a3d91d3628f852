use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use shared::domain::{Vehicle, VehicleId, VehicleStatus};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),
    #[error("vehicle {0} already exists")]
    DuplicateVehicle(VehicleId),
}

/// In-memory vehicle table. Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct FleetStore {
    vehicles: Arc<RwLock<HashMap<VehicleId, Vehicle>>>,
}

impl FleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vehicles(vehicles: impl IntoIterator<Item = Vehicle>) -> Self {
        let vehicles = vehicles
            .into_iter()
            .map(|vehicle| (vehicle.id.clone(), vehicle))
            .collect();
        Self {
            vehicles: Arc::new(RwLock::new(vehicles)),
        }
    }

    /// The demo fleet the dashboard starts with.
    pub fn seeded() -> Self {
        let now = Utc::now();
        Self::with_vehicles([
            demo_vehicle(
                "VH-1001",
                VehicleStatus::Available,
                "San Francisco, CA",
                None,
                126.50,
                7,
                now,
            ),
            demo_vehicle(
                "VH-1002",
                VehicleStatus::InRide,
                "San Francisco, CA",
                Some("DR-9001"),
                312.10,
                14,
                now,
            ),
            demo_vehicle(
                "VH-1003",
                VehicleStatus::Maintenance,
                "Oakland, CA",
                Some("DR-9002"),
                88.40,
                4,
                now,
            ),
            demo_vehicle(
                "VH-1004",
                VehicleStatus::Available,
                "San Jose, CA",
                None,
                204.00,
                10,
                now,
            ),
        ])
    }

    pub async fn health_check(&self) -> bool {
        let _guard = self.vehicles.read().await;
        true
    }

    /// All vehicles, most recently updated first. Ties break on id so the
    /// order is stable between calls.
    pub async fn list_vehicles(&self) -> Vec<Vehicle> {
        let guard = self.vehicles.read().await;
        let mut vehicles: Vec<Vehicle> = guard.values().cloned().collect();
        vehicles.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        vehicles
    }

    pub async fn get_vehicle(&self, vehicle_id: &VehicleId) -> Option<Vehicle> {
        self.vehicles.read().await.get(vehicle_id).cloned()
    }

    pub async fn insert_vehicle(&self, vehicle: Vehicle) -> Result<(), StoreError> {
        let mut guard = self.vehicles.write().await;
        if guard.contains_key(&vehicle.id) {
            return Err(StoreError::DuplicateVehicle(vehicle.id));
        }
        guard.insert(vehicle.id.clone(), vehicle);
        Ok(())
    }

    pub async fn update_status(
        &self,
        vehicle_id: &VehicleId,
        status: VehicleStatus,
    ) -> Result<Vehicle, StoreError> {
        let mut guard = self.vehicles.write().await;
        let vehicle = guard
            .get_mut(vehicle_id)
            .ok_or_else(|| StoreError::VehicleNotFound(vehicle_id.clone()))?;
        vehicle.status = status;
        vehicle.updated_at = Utc::now();
        info!(vehicle_id = %vehicle_id, %status, "fleet: status updated");
        Ok(vehicle.clone())
    }

    pub async fn assign_driver(
        &self,
        vehicle_id: &VehicleId,
        driver: Option<String>,
    ) -> Result<Vehicle, StoreError> {
        let mut guard = self.vehicles.write().await;
        let vehicle = guard
            .get_mut(vehicle_id)
            .ok_or_else(|| StoreError::VehicleNotFound(vehicle_id.clone()))?;
        vehicle.driver = driver;
        vehicle.updated_at = Utc::now();
        info!(
            vehicle_id = %vehicle_id,
            driver = vehicle.driver.as_deref().unwrap_or("<none>"),
            "fleet: driver assignment updated"
        );
        Ok(vehicle.clone())
    }
}

fn demo_vehicle(
    id: &str,
    status: VehicleStatus,
    location: &str,
    driver: Option<&str>,
    earnings_today: f64,
    rides_today: u32,
    updated_at: DateTime<Utc>,
) -> Vehicle {
    Vehicle {
        id: VehicleId::new(id),
        status,
        location: location.to_string(),
        driver: driver.map(str::to_string),
        earnings_today,
        rides_today,
        updated_at,
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
