//! Request-level orchestration: order → catalog → documents → summary.
//!
//! Also the home of the idempotency registry. The platform offers no
//! at-most-once guarantee and a retried relocation would happily move the
//! same stock twice, so callers may pass an idempotency key that is deduped
//! here, at the orchestrator boundary, before any remote write happens.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::platform::types::OrderLine;
use crate::services::catalog::CatalogResolver;
use crate::services::documents::{
    DocumentOrchestrator, IssueOptions, IssuedLine, LineFailure, MoveLine,
};
use crate::services::locations::LocationService;
use crate::services::orders::OrderResolver;

/// How long a completed relocation summary is replayed for its key.
const IDEMPOTENCY_TTL: Duration = Duration::from_secs(600);

/// Which bins to drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    /// Sweep every discovered bin (minus destination and exclusions).
    All,
    /// Caller-ordered list; may be empty for unallocated-only moves.
    Named(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct RelocationRequest {
    pub order_id: Option<String>,
    pub order_number: Option<String>,
    pub destination: String,
    pub sources: SourceSelection,
    pub exclude: Vec<String>,
    pub prefer_unallocated: bool,
    pub partial: bool,
    pub skus: Option<Vec<String>>,
    pub idempotency_key: Option<String>,
}

/// What the caller gets back on success.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RelocationSummary {
    pub order_id: i64,
    pub order_number: String,
    pub destination: String,
    pub issue_document_id: i64,
    pub receipt_document_id: i64,
    pub requested_units: u32,
    pub moved_units: u32,
    pub moved: Vec<IssuedLine>,
    /// SKUs that could not be resolved to a catalog product.
    pub missing: Vec<String>,
    /// Line-adds the platform rejected along the way.
    pub failures: Vec<LineFailure>,
}

#[derive(Clone)]
enum IdempotencyEntry {
    InFlight(Instant),
    Completed(RelocationSummary, Instant),
}

/// In-process replay registry keyed by the caller's idempotency token.
#[derive(Clone, Default)]
pub struct IdempotencyRegistry {
    entries: Arc<DashMap<String, IdempotencyEntry>>,
}

impl IdempotencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the key. Returns a stored summary to replay, an error when the
    /// key is currently in flight, or `None` when the caller should proceed.
    fn begin(&self, key: &str) -> Result<Option<RelocationSummary>, ServiceError> {
        self.cleanup();
        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => match entry.get() {
                IdempotencyEntry::InFlight(_) => Err(ServiceError::Conflict(format!(
                    "a relocation with idempotency key '{key}' is already in flight"
                ))),
                IdempotencyEntry::Completed(summary, _) => Ok(Some(summary.clone())),
            },
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(IdempotencyEntry::InFlight(Instant::now()));
                Ok(None)
            }
        }
    }

    fn complete(&self, key: &str, summary: RelocationSummary) {
        self.entries.insert(
            key.to_string(),
            IdempotencyEntry::Completed(summary, Instant::now()),
        );
    }

    /// Failed requests release their key so the caller may retry.
    fn abandon(&self, key: &str) {
        self.entries.remove(key);
    }

    fn cleanup(&self) {
        self.entries.retain(|_, entry| match entry {
            IdempotencyEntry::InFlight(started) => started.elapsed() < IDEMPOTENCY_TTL,
            IdempotencyEntry::Completed(_, stored) => stored.elapsed() < IDEMPOTENCY_TTL,
        });
    }
}

#[derive(Clone)]
pub struct RelocationService {
    orders: OrderResolver,
    catalog: CatalogResolver,
    locations: LocationService,
    documents: DocumentOrchestrator,
    idempotency: IdempotencyRegistry,
}

impl RelocationService {
    pub fn new(
        orders: OrderResolver,
        catalog: CatalogResolver,
        locations: LocationService,
        documents: DocumentOrchestrator,
    ) -> Self {
        Self {
            orders,
            catalog,
            locations,
            documents,
            idempotency: IdempotencyRegistry::new(),
        }
    }

    #[instrument(skip(self, request), fields(
        order_id = request.order_id.as_deref().unwrap_or(""),
        order_number = request.order_number.as_deref().unwrap_or(""),
    ))]
    pub async fn relocate(
        &self,
        request: RelocationRequest,
    ) -> Result<RelocationSummary, ServiceError> {
        if request.destination.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "destination bin ('to') is required".to_string(),
            ));
        }

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(stored) = self.idempotency.begin(key)? {
                info!(key, "replaying stored relocation summary");
                return Ok(stored);
            }
        }

        let result = self.run(&request).await;

        if let Some(key) = request.idempotency_key.as_deref() {
            match &result {
                Ok(summary) => self.idempotency.complete(key, summary.clone()),
                Err(_) => self.idempotency.abandon(key),
            }
        }
        result
    }

    async fn run(&self, request: &RelocationRequest) -> Result<RelocationSummary, ServiceError> {
        let order = self
            .orders
            .resolve(
                request.order_id.as_deref(),
                request.order_number.as_deref(),
            )
            .await?;

        let allow: Option<HashSet<&str>> = request
            .skus
            .as_ref()
            .map(|skus| skus.iter().map(String::as_str).collect());
        let lines: Vec<&OrderLine> = order
            .products
            .iter()
            .filter(|line| line.quantity > 0)
            .filter(|line| {
                allow
                    .as_ref()
                    .map_or(true, |allowed| allowed.contains(line.sku.trim()))
            })
            .collect();
        if lines.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "order {} has no lines to relocate",
                order.order_id
            )));
        }

        let destination = self.locations.resolve_name(&request.destination).await?;

        let source_bins = match &request.sources {
            SourceSelection::All => {
                self.locations
                    .discover_sources(&destination, &request.exclude)
                    .await?
            }
            SourceSelection::Named(names) => {
                let mut bins = Vec::new();
                for name in names {
                    let resolved = self.locations.resolve_name(name).await?;
                    if resolved != destination
                        && !request.exclude.contains(&resolved)
                        && !bins.contains(&resolved)
                    {
                        bins.push(resolved);
                    }
                }
                bins
            }
        };

        let mut plan = Vec::new();
        let mut missing = Vec::new();
        for line in &lines {
            match self.catalog.resolve_line(line).await? {
                Some(resolved) => plan.push(MoveLine {
                    sku: display_identifier(line),
                    quantity: line.quantity,
                    product: resolved.product,
                }),
                None => missing.push(display_identifier(line)),
            }
        }
        if plan.is_empty() {
            return Err(ServiceError::InsufficientStock {
                message: format!(
                    "no line of order {} could be resolved to a catalog product",
                    order.order_id
                ),
                detail: Some(json!({ "missing": missing })),
            });
        }

        let opts = IssueOptions {
            source_bins,
            prefer_unallocated: request.prefer_unallocated,
            partial: request.partial,
        };
        let requested_units: u32 = plan.iter().map(|l| l.quantity).sum();
        let outcome = self.documents.relocate(&plan, &destination, &opts).await?;
        let moved_units: u32 = outcome.issued.iter().map(|l| l.issued).sum();

        info!(
            order_id = order.order_id,
            issue_document_id = outcome.issue_document_id,
            receipt_document_id = outcome.receipt_document_id,
            moved_units,
            requested_units,
            "relocation complete"
        );

        Ok(RelocationSummary {
            order_id: order.order_id,
            order_number: order.order_number.clone(),
            destination,
            issue_document_id: outcome.issue_document_id,
            receipt_document_id: outcome.receipt_document_id,
            requested_units,
            moved_units,
            moved: outcome.issued,
            missing,
            failures: outcome.failures,
        })
    }
}

/// Best identifier for reporting a line: SKU, then EAN, then a placeholder.
fn display_identifier(line: &OrderLine) -> String {
    let sku = line.sku.trim();
    if !sku.is_empty() {
        return sku.to_string();
    }
    line.ean
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or("(no identifier)")
        .to_string()
}
