//! Connector for the remote e-commerce/warehouse platform.
//!
//! Every operation is one POST to a single RPC endpoint: a `method` form
//! field plus a JSON-encoded `parameters` blob, authenticated with a static
//! token header. Responses embed errors in the payload rather than using
//! HTTP status codes, so every call is funneled through [`PlatformClient::call`]
//! which checks the envelope before handing the payload to the typed layer.

pub mod types;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use types::*;

/// Header carrying the platform API token.
pub const TOKEN_HEADER: &str = "X-Api-Token";

/// Which optional platform features this account exposes. Probed once at
/// startup so request handling branches on data instead of error types.
#[derive(Debug, Clone, Copy)]
pub struct PlatformCapabilities {
    /// `getInventoryErpUnits` is available (batch/expiry tracking enabled).
    pub erp_units: bool,
    /// `getInventoryLocations` is available as an explicit listing.
    pub location_listing: bool,
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self {
            erp_units: true,
            location_listing: true,
        }
    }
}

#[derive(Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl PlatformClient {
    pub fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.platform_timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.platform_api_url.clone(),
            token: config.platform_api_token.clone(),
        })
    }

    /// Performs one RPC call and normalizes the result.
    ///
    /// Transport failures, non-success HTTP statuses and envelope errors all
    /// come back as [`ServiceError::ExternalApiError`] carrying the raw
    /// upstream payload for operator debugging.
    #[instrument(skip(self, params), fields(method = method))]
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, ServiceError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let parameters = serde_json::to_string(params)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        debug!(parameters = %parameters, "platform call");

        let response = self
            .http
            .post(&self.base_url)
            .header(TOKEN_HEADER, &self.token)
            .form(&[("method", method), ("parameters", parameters.as_str())])
            .send()
            .await
            .map_err(|e| ServiceError::ExternalApiError {
                method: method.to_string(),
                code: None,
                message: format!("transport error: {e}"),
                detail: None,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::ExternalApiError {
                method: method.to_string(),
                code: None,
                message: format!("failed reading response body: {e}"),
                detail: None,
            })?;

        if !status.is_success() {
            return Err(ServiceError::ExternalApiError {
                method: method.to_string(),
                code: None,
                message: format!("HTTP {status}"),
                detail: serde_json::from_str(&body).ok(),
            });
        }

        let raw: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ServiceError::ExternalApiError {
                method: method.to_string(),
                code: None,
                message: format!("invalid JSON response: {e}"),
                detail: None,
            })?;

        let envelope: Envelope = serde_json::from_value(raw.clone())
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        if let Some(message) = envelope.error_description() {
            warn!(method, %message, "platform returned an error");
            return Err(ServiceError::ExternalApiError {
                method: method.to_string(),
                code: envelope.error_code,
                message,
                detail: Some(raw),
            });
        }

        serde_json::from_value(raw).map_err(|e| ServiceError::ExternalApiError {
            method: method.to_string(),
            code: None,
            message: format!("unexpected response shape: {e}"),
            detail: None,
        })
    }

    // -- typed helpers ------------------------------------------------------

    pub async fn get_orders(&self, params: &GetOrdersParams) -> Result<Vec<Order>, ServiceError> {
        let resp: OrdersResponse = self.call("getOrders", params).await?;
        Ok(resp.orders)
    }

    pub async fn get_products_data(
        &self,
        params: &GetProductsDataParams,
    ) -> Result<Vec<CatalogProduct>, ServiceError> {
        let resp: ProductsResponse = self.call("getInventoryProductsData", params).await?;
        Ok(resp.products)
    }

    pub async fn get_products_list(
        &self,
        inventory_id: &str,
        page: u32,
    ) -> Result<Vec<CatalogProduct>, ServiceError> {
        let params = GetProductsListParams {
            inventory_id: inventory_id.to_string(),
            page,
        };
        let resp: ProductsResponse = self.call("getInventoryProductsList", &params).await?;
        Ok(resp.products)
    }

    pub async fn get_erp_units(
        &self,
        product_id: i64,
        warehouse_id: &str,
    ) -> Result<Vec<ErpUnit>, ServiceError> {
        let params = GetErpUnitsParams {
            product_id,
            warehouse_id: warehouse_id.to_string(),
        };
        let resp: ErpUnitsResponse = self.call("getInventoryErpUnits", &params).await?;
        Ok(resp.units)
    }

    pub async fn get_locations(&self, warehouse_id: &str) -> Result<Vec<Location>, ServiceError> {
        let params = GetLocationsParams {
            warehouse_id: warehouse_id.to_string(),
        };
        let resp: LocationsResponse = self.call("getInventoryLocations", &params).await?;
        Ok(resp.locations)
    }

    pub async fn get_warehouses(&self) -> Result<Vec<Warehouse>, ServiceError> {
        let resp: WarehousesResponse = self
            .call("getInventoryWarehouses", &serde_json::json!({}))
            .await?;
        Ok(resp.warehouses)
    }

    pub async fn create_document(
        &self,
        warehouse_id: &str,
        document_type: DocumentType,
    ) -> Result<i64, ServiceError> {
        let params = CreateDocumentParams {
            warehouse_id: warehouse_id.to_string(),
            document_type,
        };
        let resp: CreateDocumentResponse = self.call("createInventoryDocument", &params).await?;
        Ok(resp.document_id)
    }

    pub async fn add_document_item(
        &self,
        params: &AddDocumentItemParams,
    ) -> Result<(), ServiceError> {
        let _: serde_json::Value = self.call("addInventoryDocumentItem", params).await?;
        Ok(())
    }

    pub async fn confirm_document(&self, document_id: i64) -> Result<(), ServiceError> {
        let params = ConfirmDocumentParams { document_id };
        let _: serde_json::Value = self.call("confirmInventoryDocument", &params).await?;
        Ok(())
    }

    pub async fn get_documents(
        &self,
        params: &GetDocumentsParams,
    ) -> Result<Vec<Document>, ServiceError> {
        let resp: DocumentsResponse = self.call("getInventoryDocuments", params).await?;
        Ok(resp.documents)
    }

    pub async fn get_document_items(
        &self,
        document_id: i64,
    ) -> Result<Vec<DocumentLine>, ServiceError> {
        let params = GetDocumentItemsParams { document_id };
        let resp: DocumentItemsResponse = self.call("getInventoryDocumentItems", &params).await?;
        Ok(resp.items)
    }

    /// Probes which optional methods this account exposes.
    ///
    /// An "unknown method" rejection means the capability is absent; any
    /// other failure (network, auth) leaves the capability assumed present
    /// so real requests surface the actual error.
    pub async fn probe_capabilities(&self, warehouse_id: &str) -> PlatformCapabilities {
        let erp_units = match self.get_erp_units(0, warehouse_id).await {
            Ok(_) => true,
            Err(e) if e.is_unknown_method() => false,
            Err(e) => {
                warn!(error = %e, "ERP unit capability probe inconclusive, assuming present");
                true
            }
        };
        let location_listing = match self.get_locations(warehouse_id).await {
            Ok(_) => true,
            Err(e) if e.is_unknown_method() => false,
            Err(e) => {
                warn!(error = %e, "location listing probe inconclusive, assuming present");
                true
            }
        };
        PlatformCapabilities {
            erp_units,
            location_listing,
        }
    }
}
