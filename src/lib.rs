//! Relocation API Library
//!
//! Moves ordered stock between bins of one fixed warehouse on a remote
//! e-commerce platform, one two-phase issue/receipt document pair per
//! request. Everything is fetched fresh from the platform per request;
//! the only state this process keeps is the idempotency replay registry.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod openapi;
pub mod platform;
pub mod services;
pub mod tracing;

use std::sync::Arc;

use axum::{response::Json, routing::get, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::platform::{PlatformCapabilities, PlatformClient};
use crate::services::{
    CatalogResolver, DocumentOrchestrator, LocationService, OrderResolver, RelocationService,
};

/// Services layer used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub orders: OrderResolver,
    pub catalog: CatalogResolver,
    pub locations: LocationService,
    pub relocations: RelocationService,
}

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub platform: Arc<PlatformClient>,
    pub capabilities: PlatformCapabilities,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        platform: Arc<PlatformClient>,
        capabilities: PlatformCapabilities,
    ) -> Self {
        let orders = OrderResolver::new(
            platform.clone(),
            config.order_scan_days,
            config.order_scan_max_pages,
        );
        let catalog = CatalogResolver::new(
            platform.clone(),
            config.inventory_id.clone(),
            config.sku_override_table(),
        );
        let locations = LocationService::new(
            platform.clone(),
            config.warehouse_id.clone(),
            config.fallback_location_list(),
            capabilities,
        );
        let documents = DocumentOrchestrator::new(
            platform.clone(),
            config.warehouse_id.clone(),
            capabilities,
        );
        let relocations = RelocationService::new(
            orders.clone(),
            catalog.clone(),
            locations.clone(),
            documents,
        );
        Self {
            config,
            platform,
            capabilities,
            services: AppServices {
                orders,
                catalog,
                locations,
                relocations,
            },
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// The `/api/v1` surface. Shared-secret auth is layered on in [`app`].
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/relocations", get(handlers::relocations::run_relocation))
        .route("/orders/recent", get(handlers::orders::recent_orders))
        .route("/orders/search", get(handlers::orders::search_order))
        .route("/products", get(handlers::inventory::list_products))
        .route("/products/:sku", get(handlers::inventory::inspect_product))
        .route("/locations", get(handlers::inventory::list_locations))
        .route("/documents/:id", get(handlers::inventory::inspect_document))
        .route("/audit/order", get(handlers::inventory::audit_order))
        .route("/audit/sku", get(handlers::inventory::audit_sku))
}

/// Assembles the full application router for the given state. The binary
/// adds its transport-level layers (CORS, compression, HTTP tracing) on top.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "relocation-api up" }))
        .route("/health", get(handlers::health::health))
        .nest(
            "/api/v1",
            api_v1_routes().layer(axum::middleware::from_fn_with_state(
                state.clone(),
                auth::require_shared_key,
            )),
        )
        .merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }
}
