use axum::{extract::State, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct CapabilitiesStatus {
    pub erp_units: bool,
    pub location_listing: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    /// "ok" when the platform answered, "degraded" otherwise.
    pub status: String,
    pub platform: String,
    pub capabilities: CapabilitiesStatus,
    pub version: String,
}

/// Liveness plus a platform reachability snapshot. Unauthenticated.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health", body = HealthStatus),
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let platform = match state.platform.get_warehouses().await {
        Ok(_) => "reachable",
        Err(_) => "unreachable",
    };
    let status = if platform == "reachable" {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthStatus {
        status: status.to_string(),
        platform: platform.to_string(),
        capabilities: CapabilitiesStatus {
            erp_units: state.capabilities.erp_units,
            location_listing: state.capabilities.location_listing,
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
