//! Bin discovery and id→name translation for the configured warehouse.
//!
//! Document lines must carry the location *name*, never the id, so every
//! caller-supplied numeric id goes through the listing first. The listing
//! itself comes from whichever source works on this account: the explicit
//! locations call, the nested warehouse structure, or a static operator list.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::errors::ServiceError;
use crate::platform::types::Location;
use crate::platform::{PlatformCapabilities, PlatformClient};

#[derive(Clone)]
pub struct LocationService {
    client: Arc<PlatformClient>,
    warehouse_id: String,
    fallback: Vec<String>,
    capabilities: PlatformCapabilities,
}

impl LocationService {
    pub fn new(
        client: Arc<PlatformClient>,
        warehouse_id: String,
        fallback: Vec<String>,
        capabilities: PlatformCapabilities,
    ) -> Self {
        Self {
            client,
            warehouse_id,
            fallback,
            capabilities,
        }
    }

    /// Lists the warehouse's bins from the first source that yields any.
    #[instrument(skip(self))]
    pub async fn list_locations(&self) -> Result<Vec<Location>, ServiceError> {
        if self.capabilities.location_listing {
            match self.client.get_locations(&self.warehouse_id).await {
                Ok(locations) if !locations.is_empty() => return Ok(locations),
                Ok(_) => debug!("explicit location listing came back empty"),
                Err(e) => warn!(error = %e, "explicit location listing failed"),
            }
        }

        match self.client.get_warehouses().await {
            Ok(warehouses) => {
                if let Some(warehouse) = warehouses
                    .into_iter()
                    .find(|w| w.warehouse_id == self.warehouse_id)
                {
                    if !warehouse.locations.is_empty() {
                        return Ok(warehouse.locations);
                    }
                    debug!("configured warehouse has no locations in the nested structure");
                }
            }
            Err(e) => warn!(error = %e, "nested warehouse listing failed"),
        }

        if !self.fallback.is_empty() {
            return Ok(self
                .fallback
                .iter()
                .map(|name| Location {
                    location_id: None,
                    name: name.clone(),
                })
                .collect());
        }

        Err(ServiceError::InvalidInput(format!(
            "no location source available for warehouse {}; configure fallback_locations",
            self.warehouse_id
        )))
    }

    /// Candidate source bins for a "sweep all bins" request: every known bin
    /// except the destination and the caller's exclusions, in listing order.
    #[instrument(skip(self))]
    pub async fn discover_sources(
        &self,
        destination: &str,
        exclude: &[String],
    ) -> Result<Vec<String>, ServiceError> {
        let locations = self.list_locations().await?;
        let mut names = Vec::new();
        for location in locations {
            let name = location.name;
            if name == destination || exclude.iter().any(|e| e == &name) {
                continue;
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            return Err(ServiceError::InvalidInput(
                "no candidate source bins remain after exclusions".to_string(),
            ));
        }
        Ok(names)
    }

    /// Translates a caller-supplied bin reference to the name the platform
    /// expects on document lines. Numeric references are treated as location
    /// ids first; anything else passes through as a name.
    #[instrument(skip(self))]
    pub async fn resolve_name(&self, input: &str) -> Result<String, ServiceError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ServiceError::InvalidInput(
                "empty location reference".to_string(),
            ));
        }
        let Ok(id) = input.parse::<i64>() else {
            return Ok(input.to_string());
        };
        match self.list_locations().await {
            Ok(locations) => {
                if let Some(found) = locations.iter().find(|l| l.location_id == Some(id)) {
                    return Ok(found.name.clone());
                }
                // A bin may legitimately be *named* with digits.
                if locations.iter().any(|l| l.name == input) {
                    return Ok(input.to_string());
                }
                debug!(id, "numeric location reference unknown, passing through");
                Ok(input.to_string())
            }
            Err(e) => {
                warn!(error = %e, "location listing unavailable for id translation");
                Ok(input.to_string())
            }
        }
    }
}
