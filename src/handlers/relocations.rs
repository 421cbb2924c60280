use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::config::parse_comma_list;
use crate::errors::ServiceError;
use crate::services::relocation::{RelocationRequest, RelocationSummary, SourceSelection};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct RelocationParams {
    /// Platform order id (fast path).
    pub order_id: Option<String>,
    /// Human order number; resolved by filter, then by scan.
    pub order_number: Option<String>,
    /// Destination bin name or id. Required.
    pub to: Option<String>,
    /// Comma-separated ordered source bins, or "all" to sweep every bin.
    pub from: Option<String>,
    /// Comma-separated bins to exclude when sweeping.
    pub exclude: Option<String>,
    /// Prefer the unallocated pool over bins.
    #[serde(default)]
    pub unallocated: bool,
    /// Allow partial placement via the halving ladder.
    #[serde(default)]
    pub partial: bool,
    /// Comma-separated SKU allow-list; other lines are left untouched.
    pub skus: Option<String>,
    /// Caller token deduplicating retried requests.
    pub idempotency_key: Option<String>,
}

/// Triggers a relocation for one order.
#[utoipa::path(
    get,
    path = "/api/v1/relocations",
    params(RelocationParams),
    responses(
        (status = 200, description = "Relocation completed", body = ApiResponse<RelocationSummary>),
        (status = 400, description = "Invalid parameters or nothing issued", body = crate::errors::ErrorResponse),
        (status = 401, description = "Shared key mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Idempotency key in flight", body = crate::errors::ErrorResponse),
        (status = 502, description = "Platform rejected the movement", body = crate::errors::ErrorResponse),
    ),
    tag = "relocations"
)]
pub async fn run_relocation(
    State(state): State<AppState>,
    Query(params): Query<RelocationParams>,
) -> ApiResult<RelocationSummary> {
    let destination = params
        .to
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ServiceError::InvalidInput("destination bin ('to') is required".to_string())
        })?
        .to_string();

    let sources = match params.from.as_deref().map(str::trim) {
        None | Some("") => SourceSelection::Named(Vec::new()),
        Some(raw) if raw.eq_ignore_ascii_case("all") => SourceSelection::All,
        Some(raw) => SourceSelection::Named(parse_comma_list(raw)),
    };

    let request = RelocationRequest {
        order_id: params.order_id,
        order_number: params.order_number,
        destination,
        sources,
        exclude: parse_comma_list(params.exclude.as_deref().unwrap_or("")),
        prefer_unallocated: params.unallocated,
        partial: params.partial,
        skus: params
            .skus
            .as_deref()
            .map(parse_comma_list)
            .filter(|skus| !skus.is_empty()),
        idempotency_key: params
            .idempotency_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty()),
    };

    let summary = state.services.relocations.relocate(request).await?;
    Ok(Json(ApiResponse::success(summary)))
}
