//! Maps order lines to catalog product identifiers.
//!
//! Vendor data is messy: SKUs drift, EANs are missing, and some account
//! types embed the catalog id directly on the order line under varying field
//! names. Resolution walks a fixed ladder, each step at most once, and an
//! unresolvable line is reported as missing instead of failing the request.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::platform::types::{CatalogProduct, GetProductsDataParams, OrderLine};
use crate::platform::PlatformClient;

/// Field names under which order lines have been observed carrying the
/// catalog product id, in the order they are trusted.
const EMBEDDED_ID_FIELDS: [&str; 4] = [
    "product_id",
    "storage_product_id",
    "catalog_product_id",
    "variant_id",
];

/// Enrichment requested with every lookup so no second round trip is needed.
const INCLUDE: [&str; 2] = ["locations", "stock"];

/// How a line was resolved; surfaced in audit exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedVia {
    Override,
    Sku,
    Ean,
    EmbeddedId,
}

#[derive(Debug, Clone)]
pub struct ResolvedProduct {
    pub product: CatalogProduct,
    pub via: ResolvedVia,
}

#[derive(Clone)]
pub struct CatalogResolver {
    client: Arc<PlatformClient>,
    inventory_id: String,
    overrides: HashMap<String, i64>,
}

impl CatalogResolver {
    pub fn new(
        client: Arc<PlatformClient>,
        inventory_id: String,
        overrides: HashMap<String, i64>,
    ) -> Self {
        Self {
            client,
            inventory_id,
            overrides,
        }
    }

    /// Resolves one order line, or `None` when every step comes up empty.
    #[instrument(skip(self, line), fields(sku = %line.sku))]
    pub async fn resolve_line(
        &self,
        line: &OrderLine,
    ) -> Result<Option<ResolvedProduct>, ServiceError> {
        let sku = line.sku.trim();

        if let Some(&product_id) = self.overrides.get(sku) {
            if let Some(product) = self.by_ids(&[product_id]).await?.into_iter().next() {
                return Ok(Some(ResolvedProduct {
                    product,
                    via: ResolvedVia::Override,
                }));
            }
            debug!(product_id, "override identifier not present in catalog");
        }

        if !sku.is_empty() {
            if let Some(product) = self.by_sku(sku).await? {
                return Ok(Some(ResolvedProduct {
                    product,
                    via: ResolvedVia::Sku,
                }));
            }
        }

        if let Some(ean) = line.ean.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            if let Some(product) = self.by_ean(ean).await? {
                return Ok(Some(ResolvedProduct {
                    product,
                    via: ResolvedVia::Ean,
                }));
            }
        }

        let candidates = embedded_candidate_ids(line);
        if !candidates.is_empty() {
            if let Some(product) = self.by_ids(&candidates).await?.into_iter().next() {
                return Ok(Some(ResolvedProduct {
                    product,
                    via: ResolvedVia::EmbeddedId,
                }));
            }
        }

        Ok(None)
    }

    /// Exact SKU lookup with enrichment.
    pub async fn by_sku(&self, sku: &str) -> Result<Option<CatalogProduct>, ServiceError> {
        let params = GetProductsDataParams {
            inventory_id: self.inventory_id.clone(),
            filter_ids: None,
            filter_sku: Some(vec![sku.to_string()]),
            filter_ean: None,
            include: INCLUDE.to_vec(),
        };
        let products = self.client.get_products_data(&params).await?;
        Ok(prefer_exact(products, |p| p.sku == sku))
    }

    async fn by_ean(&self, ean: &str) -> Result<Option<CatalogProduct>, ServiceError> {
        let params = GetProductsDataParams {
            inventory_id: self.inventory_id.clone(),
            filter_ids: None,
            filter_sku: None,
            filter_ean: Some(vec![ean.to_string()]),
            include: INCLUDE.to_vec(),
        };
        let products = self.client.get_products_data(&params).await?;
        Ok(prefer_exact(products, |p| p.ean.as_deref() == Some(ean)))
    }

    async fn by_ids(&self, ids: &[i64]) -> Result<Vec<CatalogProduct>, ServiceError> {
        let params = GetProductsDataParams {
            inventory_id: self.inventory_id.clone(),
            filter_ids: Some(ids.to_vec()),
            filter_sku: None,
            filter_ean: None,
            include: INCLUDE.to_vec(),
        };
        self.client.get_products_data(&params).await
    }
}

/// Picks the exact match when the platform filter returned near-misses,
/// otherwise the first record.
fn prefer_exact<F>(products: Vec<CatalogProduct>, is_exact: F) -> Option<CatalogProduct>
where
    F: Fn(&CatalogProduct) -> bool,
{
    if let Some(pos) = products.iter().position(|p| is_exact(p)) {
        return products.into_iter().nth(pos);
    }
    products.into_iter().next()
}

/// Identifier candidates embedded on the raw line payload, numeric or
/// numeric-string valued.
fn embedded_candidate_ids(line: &OrderLine) -> Vec<i64> {
    let mut ids = Vec::new();
    for field in EMBEDDED_ID_FIELDS {
        let Some(value) = line.extra.get(field) else {
            continue;
        };
        let id = match value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        if let Some(id) = id.filter(|id| *id > 0) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}
