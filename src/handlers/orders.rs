use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::ServiceError;
use crate::platform::types::Order;
use crate::{ApiResponse, ApiResult, AppState};

/// Compact order view for the diagnostics endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDigest {
    pub order_id: i64,
    pub order_number: String,
    pub created_at: Option<String>,
    pub confirmed_at: Option<String>,
    pub lines: usize,
    pub units: u32,
}

impl From<&Order> for OrderDigest {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id,
            order_number: order.order_number.clone(),
            created_at: epoch_to_rfc3339(order.date_add),
            confirmed_at: epoch_to_rfc3339(order.date_confirmed),
            lines: order.products.len(),
            units: order.products.iter().map(|l| l.quantity).sum(),
        }
    }
}

fn epoch_to_rfc3339(epoch: i64) -> Option<String> {
    if epoch <= 0 {
        return None;
    }
    Utc.timestamp_opt(epoch, 0)
        .single()
        .map(|ts| ts.to_rfc3339())
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecentOrdersParams {
    /// Lookback in days.
    #[serde(default = "default_days")]
    pub days: i64,
    /// Maximum number of orders returned.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_days() -> i64 {
    1
}

fn default_limit() -> usize {
    50
}

/// Lists recently created/confirmed orders, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/orders/recent",
    params(RecentOrdersParams),
    responses(
        (status = 200, description = "Recent orders", body = ApiResponse<Vec<OrderDigest>>),
        (status = 401, description = "Shared key mismatch", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn recent_orders(
    State(state): State<AppState>,
    Query(params): Query<RecentOrdersParams>,
) -> ApiResult<Vec<OrderDigest>> {
    let orders = state
        .services
        .orders
        .recent(params.days, params.limit)
        .await?;
    let digests = orders.iter().map(OrderDigest::from).collect();
    Ok(Json(ApiResponse::success(digests)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchOrderParams {
    /// Order number (or platform id for orders without one).
    pub number: String,
}

/// Dry-runs the order resolver: same matching rules as a relocation, no
/// side effects.
#[utoipa::path(
    get,
    path = "/api/v1/orders/search",
    params(SearchOrderParams),
    responses(
        (status = 200, description = "Best matching order", body = ApiResponse<OrderDigest>),
        (status = 401, description = "Shared key mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "No order matches", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn search_order(
    State(state): State<AppState>,
    Query(params): Query<SearchOrderParams>,
) -> ApiResult<OrderDigest> {
    if params.number.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "'number' must not be empty".to_string(),
        ));
    }
    let order = state
        .services
        .orders
        .resolve(None, Some(&params.number))
        .await?;
    Ok(Json(ApiResponse::success(OrderDigest::from(&order))))
}
