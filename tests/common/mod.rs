//! Test harness: the axum router wired against a wiremock stand-in for the
//! remote platform.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{Match, Mock, MockServer, Request as WireRequest, ResponseTemplate};

use relocation_api::config::AppConfig;
use relocation_api::platform::PlatformClient;
use relocation_api::AppState;

pub const SHARED_KEY: &str = "test-secret";
pub const WAREHOUSE_ID: &str = "77617";
pub const INVENTORY_ID: &str = "3001";

pub fn test_config(platform_url: &str) -> AppConfig {
    AppConfig {
        platform_api_url: platform_url.to_string(),
        platform_api_token: "test-token".to_string(),
        shared_key: SHARED_KEY.to_string(),
        warehouse_id: WAREHOUSE_ID.to_string(),
        inventory_id: INVENTORY_ID.to_string(),
        fallback_locations: None,
        sku_overrides: None,
        order_scan_days: 365,
        order_scan_max_pages: 20,
        platform_timeout_secs: 5,
        host: "127.0.0.1".to_string(),
        port: 8080,
        environment: "test".to_string(),
        log_level: "info".to_string(),
        log_json: false,
        cors_allowed_origins: None,
    }
}

/// Application harness around a mock platform server.
pub struct TestApp {
    pub router: Router,
    pub server: MockServer,
}

impl TestApp {
    /// Starts a mock platform with both optional capabilities present and
    /// builds the app against it. Mount scenario mocks on `server` first.
    pub async fn start(server: MockServer) -> Self {
        let config = test_config(&server.uri());
        let platform =
            Arc::new(PlatformClient::new(&config).expect("platform client should build"));
        let capabilities = platform.probe_capabilities(&config.warehouse_id).await;
        let state = AppState::new(config, platform, capabilities);
        Self {
            router: relocation_api::app(state),
            server,
        }
    }

    /// New mock server with capability probes answering "present".
    pub async fn with_default_probes() -> Self {
        let server = MockServer::start().await;
        mount_probe_defaults(&server).await;
        Self::start(server).await
    }

    pub async fn get(&self, path_and_query: &str) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(path_and_query)
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("router should respond")
    }

    /// GET with the shared key appended.
    pub async fn get_authenticated(&self, path_and_query: &str) -> Response {
        let sep = if path_and_query.contains('?') { '&' } else { '?' };
        self.get(&format!("{path_and_query}{sep}key={SHARED_KEY}"))
            .await
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf-8 response")
}

// ---------------------------------------------------------------------------
// Matchers over the platform's RPC form encoding
// ---------------------------------------------------------------------------

fn form_field(request: &WireRequest, name: &str) -> Option<String> {
    url::form_urlencoded::parse(&request.body)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Matches the RPC `method` form field exactly.
pub struct MethodIs(pub &'static str);

impl Match for MethodIs {
    fn matches(&self, request: &WireRequest) -> bool {
        form_field(request, "method").as_deref() == Some(self.0)
    }
}

/// Matches a substring of the decoded `parameters` JSON blob.
pub struct ParamsContain(pub String);

impl ParamsContain {
    pub fn new(fragment: &str) -> Self {
        Self(fragment.to_string())
    }
}

impl Match for ParamsContain {
    fn matches(&self, request: &WireRequest) -> bool {
        form_field(request, "parameters").is_some_and(|p| p.contains(&self.0))
    }
}

/// Matches a predicate over the decoded `parameters` JSON value.
pub struct ParamsMatch<F>(pub F)
where
    F: Fn(&Value) -> bool + Send + Sync;

impl<F> Match for ParamsMatch<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn matches(&self, request: &WireRequest) -> bool {
        form_field(request, "parameters")
            .and_then(|p| serde_json::from_str::<Value>(&p).ok())
            .is_some_and(|v| (self.0)(&v))
    }
}

// ---------------------------------------------------------------------------
// Canned responses
// ---------------------------------------------------------------------------

pub fn success(body: Value) -> ResponseTemplate {
    let mut merged = json!({"status": "SUCCESS"});
    if let (Value::Object(target), Value::Object(source)) = (&mut merged, body) {
        target.extend(source);
    }
    ResponseTemplate::new(200).set_body_json(merged)
}

pub fn platform_error(code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "ERROR",
        "error_code": code,
        "error_message": message,
    }))
}

/// Capability probes answering "present" (empty but successful payloads).
pub async fn mount_probe_defaults(server: &MockServer) {
    Mock::given(MethodIs("getInventoryErpUnits"))
        .and(ParamsContain::new("\"product_id\":0"))
        .respond_with(success(json!({"units": []})))
        .mount(server)
        .await;
    Mock::given(MethodIs("getInventoryLocations"))
        .respond_with(success(json!({
            "locations": [
                {"location_id": 1, "name": "A"},
                {"location_id": 2, "name": "B"},
                {"location_id": 3, "name": "DEST"}
            ]
        })))
        .mount(server)
        .await;
}

/// One order with the given lines, fetchable by id.
pub async fn mount_order(server: &MockServer, order_id: i64, lines: Value) {
    Mock::given(MethodIs("getOrders"))
        .and(ParamsContain::new(&format!("\"order_id\":{order_id}")))
        .respond_with(success(json!({
            "orders": [{
                "order_id": order_id,
                "order_number": format!("N{order_id}"),
                "date_add": 1754300000i64,
                "date_confirmed": 1754300600i64,
                "products": lines,
            }]
        })))
        .mount(server)
        .await;
}

/// A catalog product found by exact SKU, enriched with allocations/stock.
pub async fn mount_product(server: &MockServer, sku: &str, product_id: i64, locations: Value) {
    let total: u32 = locations
        .as_array()
        .map(|allocs| {
            allocs
                .iter()
                .filter_map(|a| a["quantity"].as_u64())
                .sum::<u64>() as u32
        })
        .unwrap_or(0);
    Mock::given(MethodIs("getInventoryProductsData"))
        .and(ParamsContain::new(&format!("\"filter_sku\":[\"{sku}\"]")))
        .respond_with(success(json!({
            "products": [{
                "product_id": product_id,
                "sku": sku,
                "locations": locations,
                "stock": { WAREHOUSE_ID: total },
            }]
        })))
        .mount(server)
        .await;
}

/// A SKU the catalog has never heard of.
pub async fn mount_missing_sku(server: &MockServer, sku: &str) {
    Mock::given(MethodIs("getInventoryProductsData"))
        .and(ParamsContain::new(&format!("\"filter_sku\":[\"{sku}\"]")))
        .respond_with(success(json!({"products": []})))
        .mount(server)
        .await;
}

/// Document creation for one type, answering with the given id.
pub async fn mount_create_document(server: &MockServer, document_type: &str, document_id: i64) {
    Mock::given(MethodIs("createInventoryDocument"))
        .and(ParamsContain::new(&format!(
            "\"document_type\":\"{document_type}\""
        )))
        .respond_with(success(json!({"document_id": document_id})))
        .mount(server)
        .await;
}

pub async fn mount_confirm(server: &MockServer, document_id: i64) {
    Mock::given(MethodIs("confirmInventoryDocument"))
        .and(ParamsContain::new(&format!(
            "\"document_id\":{document_id}"
        )))
        .respond_with(success(json!({})))
        .mount(server)
        .await;
}

/// Matcher for an add-item call placing `quantity` into `location` on the
/// given document. Relies on the stable field order of the serialized
/// parameter blob.
pub fn add_item(document_id: i64, quantity: u32, location: &str) -> impl Match {
    ParamsAll(vec![
        format!("\"document_id\":{document_id}"),
        format!("\"quantity\":{quantity},\"location\":\"{location}\""),
    ])
}

/// Matcher for an add-item call with no location (unallocated pool).
pub fn add_unallocated_item(document_id: i64, quantity: u32) -> impl Match {
    ParamsMatch(move |params: &Value| {
        params["document_id"] == json!(document_id)
            && params["quantity"] == json!(quantity)
            && params.get("location").is_none()
    })
}

/// All fragments must appear in the decoded parameters blob.
pub struct ParamsAll(pub Vec<String>);

impl Match for ParamsAll {
    fn matches(&self, request: &WireRequest) -> bool {
        form_field(request, "parameters")
            .is_some_and(|p| self.0.iter().all(|fragment| p.contains(fragment)))
    }
}
