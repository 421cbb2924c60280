//! Normalized wire model for the remote platform.
//!
//! The vendor API is loose about field names across account configurations
//! (`quantity` vs `qty`, `name` vs `location_name`, dates as empty strings).
//! Everything is normalized here, immediately at the boundary, so the rest of
//! the crate only ever sees these types.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Response envelope shared by every platform method.
///
/// Success responses carry `status: "SUCCESS"` plus the payload fields;
/// failures carry either an embedded `error` value or `status: "ERROR"` with
/// `error_code`/`error_message`.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Envelope {
    /// Returns the embedded error description when the payload is a failure.
    pub fn error_description(&self) -> Option<String> {
        if let Some(err) = &self.error {
            if !err.is_null() && *err != Value::Bool(false) {
                return Some(match err {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            }
        }
        if self.status.as_deref() == Some("ERROR") {
            return Some(
                self.error_message
                    .clone()
                    .or_else(|| self.error_code.clone())
                    .unwrap_or_else(|| "unspecified platform error".to_string()),
            );
        }
        None
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// An order as returned by `getOrders`. Read-only on our side.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Order {
    pub order_id: i64,
    /// Empty for manually created orders.
    #[serde(default)]
    pub order_number: String,
    /// Creation timestamp, epoch seconds.
    #[serde(default)]
    pub date_add: i64,
    /// Confirmation timestamp, epoch seconds; 0 while unconfirmed.
    #[serde(default)]
    pub date_confirmed: i64,
    #[serde(default)]
    pub products: Vec<OrderLine>,
}

/// One ordered line. Unknown fields are retained in `extra` because several
/// account types embed the catalog product identifier under different names.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct OrderLine {
    #[serde(default)]
    pub sku: String,
    #[serde(default, alias = "barcode")]
    pub ean: Option<String>,
    #[serde(default, alias = "qty")]
    pub quantity: u32,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: serde_json::Map<String, Value>,
}

/// Catalog product record, optionally enriched with bin allocations and
/// aggregate stock per warehouse.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CatalogProduct {
    #[serde(alias = "id")]
    pub product_id: i64,
    #[serde(default)]
    pub sku: String,
    #[serde(default, alias = "barcode")]
    pub ean: Option<String>,
    #[serde(default)]
    pub locations: Vec<BinAllocation>,
    /// Quantity by warehouse id.
    #[serde(default)]
    pub stock: HashMap<String, u32>,
}

impl CatalogProduct {
    pub fn total_stock(&self) -> u32 {
        self.stock.values().sum()
    }
}

/// Quantity sitting in one named bin.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct BinAllocation {
    #[serde(alias = "location_name", alias = "name")]
    pub location: String,
    #[serde(default, alias = "qty")]
    pub quantity: u32,
}

/// Batch record ("ERP unit"): a quantity sharing price, expiry and label.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ErpUnit {
    #[serde(default, alias = "qty")]
    pub quantity: u32,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default, alias = "batch_number")]
    pub batch: Option<String>,
}

/// Warehouse location (bin). Document lines take the *name*; the id only
/// appears in listings, so fallback-sourced entries may not have one.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Location {
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(alias = "location_name")]
    pub name: String,
}

/// Warehouse entry in the nested `getInventoryWarehouses` structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Warehouse {
    pub warehouse_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// Inventory document kind. The platform knows three; we only ever create
/// the first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Issue,
    Receipt,
    Transfer,
}

/// Inventory document header.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Document {
    pub document_id: i64,
    #[serde(default)]
    pub document_type: Option<DocumentType>,
    #[serde(default)]
    pub warehouse_id: Option<String>,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub date_add: i64,
}

/// One line of an inventory document.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct DocumentLine {
    pub product_id: i64,
    #[serde(default, alias = "qty")]
    pub quantity: u32,
    #[serde(default, alias = "location_name")]
    pub location: Option<String>,
    #[serde(default, alias = "batch_number")]
    pub batch: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Request parameter blobs. Serialized to JSON and sent as the `parameters`
// form field; `skip_serializing_if` keeps the blobs minimal the way the
// platform expects them.
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize)]
pub struct GetOrdersParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_order_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_confirmed_from: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get_unconfirmed_orders: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct OrdersResponse {
    #[serde(default)]
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
pub struct GetProductsDataParams {
    pub inventory_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_sku: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_ean: Option<Vec<String>>,
    pub include: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct ProductsResponse {
    #[serde(default)]
    pub products: Vec<CatalogProduct>,
}

#[derive(Debug, Serialize)]
pub struct GetProductsListParams {
    pub inventory_id: String,
    pub page: u32,
}

#[derive(Debug, Serialize)]
pub struct GetErpUnitsParams {
    pub product_id: i64,
    pub warehouse_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ErpUnitsResponse {
    #[serde(default)]
    pub units: Vec<ErpUnit>,
}

#[derive(Debug, Serialize)]
pub struct GetLocationsParams {
    pub warehouse_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LocationsResponse {
    #[serde(default)]
    pub locations: Vec<Location>,
}

#[derive(Debug, Deserialize)]
pub struct WarehousesResponse {
    #[serde(default)]
    pub warehouses: Vec<Warehouse>,
}

#[derive(Debug, Serialize)]
pub struct CreateDocumentParams {
    pub warehouse_id: String,
    pub document_type: DocumentType,
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentResponse {
    pub document_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddDocumentItemParams {
    pub document_id: i64,
    pub product_id: i64,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmDocumentParams {
    pub document_id: i64,
}

#[derive(Debug, Serialize)]
pub struct GetDocumentsParams {
    pub warehouse_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentsResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
}

#[derive(Debug, Serialize)]
pub struct GetDocumentItemsParams {
    pub document_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DocumentItemsResponse {
    #[serde(default)]
    pub items: Vec<DocumentLine>,
}
