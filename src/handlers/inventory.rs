use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::ServiceError;
use crate::handlers::{build_delimited_payload, ExportFormat};
use crate::platform::types::{
    BinAllocation, Document, DocumentLine, ErpUnit, GetDocumentsParams, Location,
};
use crate::services::catalog::ResolvedVia;
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 {
    1
}

/// Catalog listing row.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductSummary {
    pub product_id: i64,
    pub sku: String,
    pub ean: Option<String>,
    pub total_stock: u32,
}

/// Lists catalog products, one platform page at a time.
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(PageParams),
    responses(
        (status = 200, description = "Catalog page", body = ApiResponse<Vec<ProductSummary>>),
        (status = 401, description = "Shared key mismatch", body = crate::errors::ErrorResponse),
    ),
    tag = "inventory"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Vec<ProductSummary>> {
    let products = state
        .platform
        .get_products_list(&state.config.inventory_id, params.page)
        .await?;
    let summaries = products
        .into_iter()
        .map(|p| ProductSummary {
            product_id: p.product_id,
            sku: p.sku,
            ean: p.ean,
            total_stock: p.stock.values().sum(),
        })
        .collect();
    Ok(Json(ApiResponse::success(summaries)))
}

/// Full per-product view: allocations, stock and the batch queue.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductInspection {
    pub product_id: i64,
    pub sku: String,
    pub ean: Option<String>,
    pub locations: Vec<BinAllocation>,
    pub stock: std::collections::HashMap<String, u32>,
    pub erp_units: Vec<ErpUnit>,
}

/// Inspects one product by SKU, including its ERP unit queue when the
/// account tracks batches.
#[utoipa::path(
    get,
    path = "/api/v1/products/{sku}",
    params(("sku" = String, Path, description = "Exact SKU")),
    responses(
        (status = 200, description = "Product details", body = ApiResponse<ProductInspection>),
        (status = 401, description = "Shared key mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "SKU not in catalog", body = crate::errors::ErrorResponse),
    ),
    tag = "inventory"
)]
pub async fn inspect_product(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> ApiResult<ProductInspection> {
    let product = state
        .services
        .catalog
        .by_sku(sku.trim())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("SKU '{sku}' not in catalog")))?;

    let erp_units = if state.capabilities.erp_units {
        state
            .platform
            .get_erp_units(product.product_id, &state.config.warehouse_id)
            .await
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Ok(Json(ApiResponse::success(ProductInspection {
        product_id: product.product_id,
        sku: product.sku,
        ean: product.ean,
        locations: product.locations,
        stock: product.stock,
        erp_units,
    })))
}

/// Lists the warehouse's bins from whichever discovery source works.
#[utoipa::path(
    get,
    path = "/api/v1/locations",
    responses(
        (status = 200, description = "Known bins", body = ApiResponse<Vec<Location>>),
        (status = 400, description = "No location source available", body = crate::errors::ErrorResponse),
        (status = 401, description = "Shared key mismatch", body = crate::errors::ErrorResponse),
    ),
    tag = "inventory"
)]
pub async fn list_locations(State(state): State<AppState>) -> ApiResult<Vec<Location>> {
    let locations = state.services.locations.list_locations().await?;
    Ok(Json(ApiResponse::success(locations)))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentInspection {
    pub document: Document,
    pub items: Vec<DocumentLine>,
}

/// Inspects one inventory document with its lines.
#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}",
    params(("id" = i64, Path, description = "Platform document id")),
    responses(
        (status = 200, description = "Document with lines", body = ApiResponse<DocumentInspection>),
        (status = 401, description = "Shared key mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown document", body = crate::errors::ErrorResponse),
    ),
    tag = "inventory"
)]
pub async fn inspect_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<DocumentInspection> {
    let params = GetDocumentsParams {
        warehouse_id: state.config.warehouse_id.clone(),
        document_id: Some(id),
        document_type: None,
        page: None,
    };
    let document = state
        .platform
        .get_documents(&params)
        .await?
        .into_iter()
        .find(|d| d.document_id == id)
        .ok_or_else(|| ServiceError::NotFound(format!("document {id} not found")))?;
    let items = state.platform.get_document_items(id).await?;
    Ok(Json(ApiResponse::success(DocumentInspection {
        document,
        items,
    })))
}

// ---------------------------------------------------------------------------
// Audit exports
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditOrderParams {
    pub order_id: Option<String>,
    pub order_number: Option<String>,
    #[serde(default)]
    pub format: ExportFormat,
}

/// One audit row per order line: how it resolved and where its stock sits.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderAuditRow {
    pub sku: String,
    pub ean: Option<String>,
    pub quantity: u32,
    pub product_id: Option<i64>,
    pub resolved_via: Option<ResolvedVia>,
    /// `bin:quantity` pairs joined with `;`.
    pub allocations: Option<String>,
    pub stock_total: Option<u32>,
    pub missing: bool,
}

/// Exports a per-order resolution audit as JSON or CSV.
#[utoipa::path(
    get,
    path = "/api/v1/audit/order",
    params(AuditOrderParams),
    responses(
        (status = 200, description = "Audit rows"),
        (status = 401, description = "Shared key mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "audit"
)]
pub async fn audit_order(
    State(state): State<AppState>,
    Query(params): Query<AuditOrderParams>,
) -> Result<Response, ServiceError> {
    let order = state
        .services
        .orders
        .resolve(params.order_id.as_deref(), params.order_number.as_deref())
        .await?;

    let mut rows = Vec::with_capacity(order.products.len());
    for line in &order.products {
        let row = match state.services.catalog.resolve_line(line).await? {
            Some(resolved) => OrderAuditRow {
                sku: line.sku.clone(),
                ean: line.ean.clone(),
                quantity: line.quantity,
                product_id: Some(resolved.product.product_id),
                resolved_via: Some(resolved.via),
                allocations: Some(format_allocations(&resolved.product.locations)),
                stock_total: Some(resolved.product.total_stock()),
                missing: false,
            },
            None => OrderAuditRow {
                sku: line.sku.clone(),
                ean: line.ean.clone(),
                quantity: line.quantity,
                product_id: None,
                resolved_via: None,
                allocations: None,
                stock_total: None,
                missing: true,
            },
        };
        rows.push(row);
    }

    render_export(&rows, params.format)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditSkuParams {
    pub sku: String,
    #[serde(default)]
    pub format: ExportFormat,
}

/// One audit row per ERP unit of a SKU (or a single totals row when the
/// account tracks no batches).
#[derive(Debug, Serialize, ToSchema)]
pub struct SkuAuditRow {
    pub sku: String,
    pub product_id: i64,
    pub batch: Option<String>,
    pub expiry_date: Option<String>,
    pub price: Option<String>,
    pub quantity: u32,
    pub stock_total: u32,
}

/// Exports the batch queue and stock snapshot for one SKU as JSON or CSV.
#[utoipa::path(
    get,
    path = "/api/v1/audit/sku",
    params(AuditSkuParams),
    responses(
        (status = 200, description = "Audit rows"),
        (status = 401, description = "Shared key mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "SKU not in catalog", body = crate::errors::ErrorResponse),
    ),
    tag = "audit"
)]
pub async fn audit_sku(
    State(state): State<AppState>,
    Query(params): Query<AuditSkuParams>,
) -> Result<Response, ServiceError> {
    let sku = params.sku.trim();
    let product = state
        .services
        .catalog
        .by_sku(sku)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("SKU '{sku}' not in catalog")))?;
    let stock_total = product.total_stock();

    let units = if state.capabilities.erp_units {
        state
            .platform
            .get_erp_units(product.product_id, &state.config.warehouse_id)
            .await
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let rows: Vec<SkuAuditRow> = if units.is_empty() {
        vec![SkuAuditRow {
            sku: product.sku.clone(),
            product_id: product.product_id,
            batch: None,
            expiry_date: None,
            price: None,
            quantity: stock_total,
            stock_total,
        }]
    } else {
        units
            .iter()
            .map(|unit| SkuAuditRow {
                sku: product.sku.clone(),
                product_id: product.product_id,
                batch: unit.batch.clone(),
                expiry_date: unit.expiry_date.map(|d| d.to_string()),
                price: unit.price.map(|p| p.to_string()),
                quantity: unit.quantity,
                stock_total,
            })
            .collect()
    };

    render_export(&rows, params.format)
}

fn format_allocations(allocations: &[BinAllocation]) -> String {
    allocations
        .iter()
        .map(|a| format!("{}:{}", a.location, a.quantity))
        .collect::<Vec<_>>()
        .join(";")
}

fn render_export<T: Serialize>(rows: &[T], format: ExportFormat) -> Result<Response, ServiceError> {
    match format {
        ExportFormat::Json => Ok(Json(ApiResponse::success(
            serde_json::to_value(rows)
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?,
        ))
        .into_response()),
        ExportFormat::Csv => {
            let (body, content_type) = build_delimited_payload(rows, ',')?;
            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type)],
                body,
            )
                .into_response())
        }
    }
}
