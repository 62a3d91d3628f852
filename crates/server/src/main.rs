use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use server_api::{
    assign_driver, fleet_metrics, list_vehicles, update_vehicle_status, ApiContext,
    AssignPatchBody, StatusPatchBody,
};
use shared::{
    domain::{Metrics, VehicleId},
    error::{ApiError, ErrorCode},
    protocol::{HealthResponse, VehicleListResponse, VehicleResponse},
};
use storage::FleetStore;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let store = if settings.seed_demo_fleet {
        FleetStore::seeded()
    } else {
        FleetStore::new()
    };
    let state = AppState {
        api: ApiContext { store },
    };
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, seeded = settings.seed_demo_fleet, "fleet backend listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("fleet backend shutting down");
        })
        .await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/vehicles", get(http_list_vehicles))
        .route("/metrics", get(http_metrics))
        .route("/vehicles/:vehicle_id/status", patch(http_update_status))
        .route("/vehicles/:vehicle_id/assign", patch(http_assign_driver))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: state.api.store.health_check().await,
    })
}

async fn http_list_vehicles(State(state): State<Arc<AppState>>) -> Json<VehicleListResponse> {
    Json(list_vehicles(&state.api).await)
}

async fn http_metrics(State(state): State<Arc<AppState>>) -> Json<Metrics> {
    Json(fleet_metrics(&state.api).await)
}

async fn http_update_status(
    State(state): State<Arc<AppState>>,
    Path(vehicle_id): Path<String>,
    body: Bytes,
) -> ApiResult<VehicleResponse> {
    let request: StatusPatchBody = lenient_json(&body);
    update_vehicle_status(&state.api, &VehicleId::new(vehicle_id), request)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn http_assign_driver(
    State(state): State<Arc<AppState>>,
    Path(vehicle_id): Path<String>,
    body: Bytes,
) -> ApiResult<VehicleResponse> {
    let request: AssignPatchBody = lenient_json(&body);
    assign_driver(&state.api, &VehicleId::new(vehicle_id), request)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Missing or malformed JSON bodies read as an empty object.
fn lenient_json<T: serde::de::DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

fn error_response(error: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match error.code {
        Some(ErrorCode::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorCode::Validation) => StatusCode::BAD_REQUEST,
        Some(ErrorCode::Internal) | None => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(error))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
