use async_trait::async_trait;
use reqwest::{
    header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA},
    Client, Method, RequestBuilder,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{normalize_driver, Metrics, Vehicle, VehicleId, VehicleStatus},
    protocol::{
        metrics_route, vehicle_assign_route, vehicle_status_route, vehicles_route,
        AssignDriverRequest, UpdateStatusRequest, VehicleListResponse, VehicleResponse,
    },
};
use tracing::debug;

use crate::error::ClientError;

/// Backend operations the dashboard controllers depend on.
#[async_trait]
pub trait FleetApi: Send + Sync {
    async fn fetch_metrics(&self) -> Result<Metrics, ClientError>;
    async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>, ClientError>;
    async fn set_vehicle_status(
        &self,
        vehicle_id: &VehicleId,
        status: VehicleStatus,
    ) -> Result<Vehicle, ClientError>;
    /// `None`, or a name that trims to nothing, unassigns the vehicle.
    async fn assign_driver(
        &self,
        vehicle_id: &VehicleId,
        driver: Option<&str>,
    ) -> Result<Vehicle, ClientError>;
}

/// JSON-over-HTTP client for the fleet backend.
#[derive(Clone)]
pub struct HttpFleetClient {
    http: Client,
    base_url: String,
}

impl HttpFleetClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(Client::new(), base_url)
    }

    pub fn with_http_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header(CONTENT_TYPE, "application/json")
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<T, ClientError> {
        let network = |source| ClientError::Network {
            path: path.to_string(),
            source,
        };

        let response = request.send().await.map_err(network)?;
        let status = response.status();
        let body = response.bytes().await.map_err(network)?;
        debug!(path, status = status.as_u16(), bytes = body.len(), "fleet api: response");

        if !status.is_success() {
            return Err(ClientError::from_status(status, path, &body));
        }

        serde_json::from_slice(&body).map_err(|source| ClientError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl FleetApi for HttpFleetClient {
    async fn fetch_metrics(&self) -> Result<Metrics, ClientError> {
        let path = metrics_route();
        self.send(self.request(Method::GET, path), path).await
    }

    async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>, ClientError> {
        let path = vehicles_route();
        let envelope: VehicleListResponse =
            self.send(self.request(Method::GET, path), path).await?;
        Ok(envelope.vehicles)
    }

    async fn set_vehicle_status(
        &self,
        vehicle_id: &VehicleId,
        status: VehicleStatus,
    ) -> Result<Vehicle, ClientError> {
        let path = vehicle_status_route(vehicle_id);
        let request = self
            .request(Method::PATCH, &path)
            .json(&UpdateStatusRequest { status });
        let envelope: VehicleResponse = self.send(request, &path).await?;
        Ok(envelope.vehicle)
    }

    async fn assign_driver(
        &self,
        vehicle_id: &VehicleId,
        driver: Option<&str>,
    ) -> Result<Vehicle, ClientError> {
        let path = vehicle_assign_route(vehicle_id);
        let request = self
            .request(Method::PATCH, &path)
            .json(&AssignDriverRequest {
                driver: normalize_driver(driver),
            });
        let envelope: VehicleResponse = self.send(request, &path).await?;
        Ok(envelope.vehicle)
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
