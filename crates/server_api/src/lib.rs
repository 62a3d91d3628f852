use serde::Deserialize;
use shared::{
    domain::{Metrics, Vehicle, VehicleId, VehicleStatus},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{VehicleListResponse, VehicleResponse},
};
use storage::{FleetStore, StoreError};
use tracing::warn;

const MIN_DRIVER_LEN: usize = 3;

#[derive(Clone)]
pub struct ApiContext {
    pub store: FleetStore,
}

/// Body of `PATCH /vehicles/{id}/status` as accepted from the wire. The
/// status is kept as raw text so an unknown value yields a validation error
/// instead of a decode failure.
#[derive(Debug, Default, Deserialize)]
pub struct StatusPatchBody {
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of `PATCH /vehicles/{id}/assign`. A missing field reads as `null`.
#[derive(Debug, Default, Deserialize)]
pub struct AssignPatchBody {
    #[serde(default)]
    pub driver: serde_json::Value,
}

pub async fn list_vehicles(ctx: &ApiContext) -> VehicleListResponse {
    VehicleListResponse {
        vehicles: ctx.store.list_vehicles().await,
    }
}

pub async fn fleet_metrics(ctx: &ApiContext) -> Metrics {
    compute_metrics(&ctx.store.list_vehicles().await)
}

pub fn compute_metrics(vehicles: &[Vehicle]) -> Metrics {
    let count =
        |status: VehicleStatus| vehicles.iter().filter(|v| v.status == status).count() as u32;
    let total = vehicles.len() as u32;
    let in_ride = count(VehicleStatus::InRide);
    let utilization_pct = if total == 0 {
        0.0
    } else {
        round_to(f64::from(in_ride) / f64::from(total) * 100.0, 1)
    };

    Metrics {
        total,
        available: count(VehicleStatus::Available),
        in_ride,
        maintenance: count(VehicleStatus::Maintenance),
        utilization_pct,
        total_rides_today: vehicles.iter().map(|v| u64::from(v.rides_today)).sum(),
        total_earnings_today: round_to(vehicles.iter().map(|v| v.earnings_today).sum(), 2),
    }
}

pub async fn update_vehicle_status(
    ctx: &ApiContext,
    vehicle_id: &VehicleId,
    body: StatusPatchBody,
) -> Result<VehicleResponse, ApiError> {
    ensure_vehicle_exists(ctx, vehicle_id).await?;

    let status = body
        .status
        .as_deref()
        .and_then(|raw| raw.parse::<VehicleStatus>().ok())
        .ok_or_else(|| {
            warn!(vehicle_id = %vehicle_id, raw = ?body.status, "fleet: rejected status update");
            ApiError::validation(invalid_status_message())
        })?;

    let vehicle = ctx
        .store
        .update_status(vehicle_id, status)
        .await
        .map_err(store_error)?;
    Ok(VehicleResponse { vehicle })
}

pub async fn assign_driver(
    ctx: &ApiContext,
    vehicle_id: &VehicleId,
    body: AssignPatchBody,
) -> Result<VehicleResponse, ApiError> {
    ensure_vehicle_exists(ctx, vehicle_id).await?;

    let driver = match body.driver {
        serde_json::Value::Null => None,
        serde_json::Value::String(driver) if driver.trim().chars().count() >= MIN_DRIVER_LEN => {
            Some(driver)
        }
        other => {
            warn!(vehicle_id = %vehicle_id, raw = %other, "fleet: rejected driver assignment");
            return Err(ApiError::validation(
                "Driver must be a string like 'DR-1234' or null",
            ));
        }
    };

    let vehicle = ctx
        .store
        .assign_driver(vehicle_id, driver)
        .await
        .map_err(store_error)?;
    Ok(VehicleResponse { vehicle })
}

fn invalid_status_message() -> String {
    let allowed: Vec<String> = VehicleStatus::ALL
        .iter()
        .map(|status| format!("'{status}'"))
        .collect();
    format!("Invalid status. Must be one of [{}]", allowed.join(", "))
}

async fn ensure_vehicle_exists(
    ctx: &ApiContext,
    vehicle_id: &VehicleId,
) -> Result<(), ApiException> {
    match ctx.store.get_vehicle(vehicle_id).await {
        Some(_) => Ok(()),
        None => Err(ApiException::new(ErrorCode::NotFound, "Vehicle not found")),
    }
}

/// `?` turns the exception into the `ApiError` body the handlers return.
fn store_error(err: StoreError) -> ApiException {
    match err {
        StoreError::VehicleNotFound(_) => {
            ApiException::new(ErrorCode::NotFound, "Vehicle not found")
        }
        StoreError::DuplicateVehicle(_) => {
            ApiException::new(ErrorCode::Internal, err.to_string())
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
