use serde::{Deserialize, Serialize};

use crate::domain::{Vehicle, VehicleId, VehicleStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleListResponse {
    pub vehicles: Vec<Vehicle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleResponse {
    pub vehicle: Vehicle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: VehicleStatus,
}

/// `driver` is always serialized; `None` goes out as `null` and means
/// "unassign", never "leave unchanged".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignDriverRequest {
    pub driver: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}

pub fn health_route() -> &'static str {
    "/health"
}

pub fn metrics_route() -> &'static str {
    "/metrics"
}

pub fn vehicles_route() -> &'static str {
    "/vehicles"
}

/// The id is percent-encoded as a single path segment.
pub fn vehicle_status_route(vehicle_id: &VehicleId) -> String {
    format!("/vehicles/{}/status", urlencoding::encode(vehicle_id.as_str()))
}

pub fn vehicle_assign_route(vehicle_id: &VehicleId) -> String {
    format!("/vehicles/{}/assign", urlencoding::encode(vehicle_id.as_str()))
}
