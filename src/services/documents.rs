//! The two-phase stock movement: an issue document draining the sources,
//! then a receipt document filling the destination.
//!
//! Documents move through one state machine: created as a draft, populated
//! line by line (the platform does not guarantee atomicity across lines),
//! confirmed exactly once and only if at least one line was accepted. The
//! receipt must mirror what the issue actually committed — never what the
//! caller originally asked for — so a partial issue still conserves total
//! quantity across the warehouse.
//!
//! A receipt failure after a confirmed issue is repaired with a compensating
//! receipt that puts the issued quantities back where they came from; if
//! that also fails, the caller gets a distinct "partially applied" error
//! naming the confirmed issue document.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::platform::types::{
    AddDocumentItemParams, CatalogProduct, DocumentType, ErpUnit, GetDocumentsParams,
};
use crate::platform::{PlatformCapabilities, PlatformClient};

/// How many recent receipt documents to inspect when reconstructing batch
/// attributes for an account that demands them on unallocated issues.
const RECEIPT_RECONSTRUCTION_DEPTH: usize = 10;

/// One line of the movement plan: a resolved product and the quantity to move.
#[derive(Debug, Clone)]
pub struct MoveLine {
    pub sku: String,
    pub quantity: u32,
    pub product: CatalogProduct,
}

/// Caller knobs for the issue phase.
#[derive(Debug, Clone, Default)]
pub struct IssueOptions {
    /// Ordered source bins; first fit wins.
    pub source_bins: Vec<String>,
    /// Draw from the unallocated pool before touching bins.
    pub prefer_unallocated: bool,
    /// Allow the halving ladder when a line cannot be placed whole.
    pub partial: bool,
}

/// Batch attributes carried on an issue line drawn from the unallocated pool.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchTag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
}

impl BatchTag {
    fn from_unit(unit: &ErpUnit) -> Self {
        Self {
            batch: unit.batch.clone(),
            expiry_date: unit.expiry_date,
            price: unit.price,
        }
    }
}

/// Where one slice of a line's quantity was actually taken from. Retained so
/// a compensating receipt can put every slice back where it came from.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueSource {
    Bin { location: String, quantity: u32 },
    Unallocated {
        quantity: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        batch: Option<BatchTag>,
    },
}

impl IssueSource {
    pub fn quantity(&self) -> u32 {
        match self {
            Self::Bin { quantity, .. } | Self::Unallocated { quantity, .. } => *quantity,
        }
    }
}

/// Per-product issue result.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedLine {
    pub product_id: i64,
    pub sku: String,
    pub requested: u32,
    pub issued: u32,
    pub sources: Vec<IssueSource>,
}

/// A rejected line-add, kept with full context for the response diagnostics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LineFailure {
    pub sku: String,
    pub product_id: i64,
    pub quantity: u32,
    /// Attempted source: a bin name, "unallocated" or "erp_units".
    pub source: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub detail: Option<Value>,
}

/// Result of a completed relocation.
#[derive(Debug, Clone)]
pub struct RelocationOutcome {
    pub issue_document_id: i64,
    pub receipt_document_id: i64,
    pub issued: Vec<IssuedLine>,
    pub failures: Vec<LineFailure>,
}

#[derive(Clone)]
pub struct DocumentOrchestrator {
    client: Arc<PlatformClient>,
    warehouse_id: String,
    capabilities: PlatformCapabilities,
}

impl DocumentOrchestrator {
    pub fn new(
        client: Arc<PlatformClient>,
        warehouse_id: String,
        capabilities: PlatformCapabilities,
    ) -> Self {
        Self {
            client,
            warehouse_id,
            capabilities,
        }
    }

    /// Runs both phases for the given plan.
    #[instrument(skip(self, lines, opts), fields(lines = lines.len()))]
    pub async fn relocate(
        &self,
        lines: &[MoveLine],
        destination: &str,
        opts: &IssueOptions,
    ) -> Result<RelocationOutcome, ServiceError> {
        let mut failures = Vec::new();

        let issue_document_id = self
            .client
            .create_document(&self.warehouse_id, DocumentType::Issue)
            .await?;
        debug!(issue_document_id, "issue draft created");

        let mut issued = Vec::new();
        for line in lines {
            let sources = self
                .issue_line(issue_document_id, line, opts, &mut failures)
                .await;
            let total: u32 = sources.iter().map(IssueSource::quantity).sum();
            if total > 0 {
                issued.push(IssuedLine {
                    product_id: line.product.product_id,
                    sku: line.sku.clone(),
                    requested: line.quantity,
                    issued: total,
                    sources,
                });
            }
        }

        let moved_units: u32 = issued.iter().map(|l| l.issued).sum();
        if moved_units == 0 {
            // The draft stays behind unconfirmed; the platform has no
            // delete call for it.
            warn!(issue_document_id, "nothing issued, draft abandoned");
            return Err(ServiceError::InsufficientStock {
                message: format!(
                    "no stock could be issued for any line (draft document {issue_document_id} left unconfirmed)"
                ),
                detail: Some(json!({ "failures": failures })),
            });
        }

        self.client.confirm_document(issue_document_id).await?;
        info!(issue_document_id, moved_units, "issue document confirmed");

        match self.receive(destination, &issued).await {
            Ok(receipt_document_id) => {
                info!(receipt_document_id, "receipt document confirmed");
                Ok(RelocationOutcome {
                    issue_document_id,
                    receipt_document_id,
                    issued,
                    failures,
                })
            }
            Err(receipt_err) => {
                error!(
                    issue_document_id,
                    error = %receipt_err,
                    "receipt failed after issue was confirmed, attempting compensation"
                );
                match self.compensate(&issued).await {
                    Ok(compensation_document_id) => {
                        info!(
                            issue_document_id,
                            compensation_document_id,
                            "issued stock returned to its sources"
                        );
                        Err(annotate_compensated(receipt_err, compensation_document_id))
                    }
                    Err(comp_err) => {
                        error!(
                            issue_document_id,
                            error = %comp_err,
                            "compensation failed, stock is partially applied"
                        );
                        Err(ServiceError::PartiallyApplied {
                            issue_document_id,
                            moved_units,
                            detail: receipt_err.detail(),
                        })
                    }
                }
            }
        }
    }

    /// Phase A for one line: the strategy ladder.
    async fn issue_line(
        &self,
        document_id: i64,
        line: &MoveLine,
        opts: &IssueOptions,
        failures: &mut Vec<LineFailure>,
    ) -> Vec<IssueSource> {
        let mut sources = Vec::new();
        let mut remaining = line.quantity;
        let unallocated_allowed = opts.prefer_unallocated || line.product.locations.is_empty();

        if opts.prefer_unallocated && remaining > 0 {
            let drawn = self
                .issue_unallocated(document_id, line, remaining, failures)
                .await;
            remaining -= drawn.iter().map(IssueSource::quantity).sum::<u32>();
            sources.extend(drawn);
        }

        if remaining > 0 && !opts.source_bins.is_empty() {
            if let Some(source) = self
                .issue_from_bins(document_id, line, remaining, &opts.source_bins, failures)
                .await
            {
                remaining -= source.quantity();
                sources.push(source);
            }
        }

        if remaining > 0 && !opts.prefer_unallocated && line.product.locations.is_empty() {
            let drawn = self
                .issue_unallocated(document_id, line, remaining, failures)
                .await;
            remaining -= drawn.iter().map(IssueSource::quantity).sum::<u32>();
            sources.extend(drawn);
        }

        if remaining > 0 && opts.partial {
            let mut size = remaining / 2;
            while remaining > 0 && size >= 1 {
                let attempt = size.min(remaining);
                let placed = self
                    .place_partial(
                        document_id,
                        line,
                        attempt,
                        &opts.source_bins,
                        unallocated_allowed,
                        failures,
                    )
                    .await;
                let amount: u32 = placed.iter().map(IssueSource::quantity).sum();
                sources.extend(placed);
                if amount == 0 {
                    if size == 1 {
                        break;
                    }
                    size /= 2;
                } else {
                    remaining -= amount;
                }
            }
        }

        if remaining > 0 {
            debug!(
                sku = %line.sku,
                remaining,
                requested = line.quantity,
                "line not fully satisfied"
            );
        }
        sources
    }

    /// One rung of the halving ladder: bins first, then the unallocated
    /// fallback where it applies.
    async fn place_partial(
        &self,
        document_id: i64,
        line: &MoveLine,
        quantity: u32,
        bins: &[String],
        unallocated_allowed: bool,
        failures: &mut Vec<LineFailure>,
    ) -> Vec<IssueSource> {
        if !bins.is_empty() {
            if let Some(source) = self
                .issue_from_bins(document_id, line, quantity, bins, failures)
                .await
            {
                return vec![source];
            }
        }
        if unallocated_allowed {
            return self
                .issue_unallocated(document_id, line, quantity, failures)
                .await;
        }
        Vec::new()
    }

    /// First fit: the whole quantity against each bin in caller order,
    /// stopping at the first bin the platform accepts.
    async fn issue_from_bins(
        &self,
        document_id: i64,
        line: &MoveLine,
        quantity: u32,
        bins: &[String],
        failures: &mut Vec<LineFailure>,
    ) -> Option<IssueSource> {
        for bin in bins {
            match self
                .add_item(document_id, line.product.product_id, quantity, Some(bin), None)
                .await
            {
                Ok(()) => {
                    return Some(IssueSource::Bin {
                        location: bin.clone(),
                        quantity,
                    });
                }
                Err(e) => record_failure(failures, line, quantity, bin, &e),
            }
        }
        None
    }

    /// Unallocated issuance, batch-aware where the account supports it:
    /// walk the FEFO queue drawing `min(remaining, unit)` per batch, stop at
    /// the first rejection. Accounts without batch data get one plain line,
    /// tagged with the most recent receipt's attributes when reconstruction
    /// finds any.
    async fn issue_unallocated(
        &self,
        document_id: i64,
        line: &MoveLine,
        want: u32,
        failures: &mut Vec<LineFailure>,
    ) -> Vec<IssueSource> {
        let product_id = line.product.product_id;
        let mut drawn = Vec::new();

        if self.capabilities.erp_units {
            let units = match self.client.get_erp_units(product_id, &self.warehouse_id).await {
                Ok(units) => units,
                Err(e) => {
                    record_failure(failures, line, want, "erp_units", &e);
                    Vec::new()
                }
            };
            let queue = fefo_order(units.into_iter().filter(|u| u.quantity > 0).collect());
            if !queue.is_empty() {
                let mut remaining = want;
                for unit in &queue {
                    if remaining == 0 {
                        break;
                    }
                    let take = remaining.min(unit.quantity);
                    let tag = BatchTag::from_unit(unit);
                    match self
                        .add_item(document_id, product_id, take, None, Some(&tag))
                        .await
                    {
                        Ok(()) => {
                            drawn.push(IssueSource::Unallocated {
                                quantity: take,
                                batch: Some(tag),
                            });
                            remaining -= take;
                        }
                        Err(e) => {
                            // Treated as "this batch is exhausted", not retried.
                            record_failure(failures, line, take, "unallocated", &e);
                            break;
                        }
                    }
                }
                return drawn;
            }
        }

        // No batch data. Some accounts still insist on the attributes used
        // when the stock was received, so try the latest receipt's first.
        let reconstructed = match self.last_receipt_batch(product_id).await {
            Ok(tag) => tag,
            Err(e) => {
                debug!(product_id, error = %e, "receipt reconstruction failed");
                None
            }
        };
        if let Some(tag) = reconstructed {
            match self
                .add_item(document_id, product_id, want, None, Some(&tag))
                .await
            {
                Ok(()) => {
                    drawn.push(IssueSource::Unallocated {
                        quantity: want,
                        batch: Some(tag),
                    });
                    return drawn;
                }
                Err(e) => record_failure(failures, line, want, "unallocated", &e),
            }
        }

        match self.add_item(document_id, product_id, want, None, None).await {
            Ok(()) => drawn.push(IssueSource::Unallocated {
                quantity: want,
                batch: None,
            }),
            Err(e) => record_failure(failures, line, want, "unallocated", &e),
        }
        drawn
    }

    /// Batch attributes from the most recent receipt line for this product.
    async fn last_receipt_batch(&self, product_id: i64) -> Result<Option<BatchTag>, ServiceError> {
        let params = GetDocumentsParams {
            warehouse_id: self.warehouse_id.clone(),
            document_id: None,
            document_type: Some(DocumentType::Receipt),
            page: Some(1),
        };
        let mut documents = self.client.get_documents(&params).await?;
        documents.sort_by_key(|d| std::cmp::Reverse((d.date_add, d.document_id)));

        for document in documents.iter().take(RECEIPT_RECONSTRUCTION_DEPTH) {
            let items = match self.client.get_document_items(document.document_id).await {
                Ok(items) => items,
                Err(e) => {
                    debug!(document_id = document.document_id, error = %e, "skipping document");
                    continue;
                }
            };
            let tag = items
                .iter()
                .filter(|item| item.product_id == product_id)
                .find(|item| {
                    item.batch.is_some() || item.expiry_date.is_some() || item.price.is_some()
                })
                .map(|item| BatchTag {
                    batch: item.batch.clone(),
                    expiry_date: item.expiry_date,
                    price: item.price,
                });
            if tag.is_some() {
                return Ok(tag);
            }
        }
        Ok(None)
    }

    /// Phase B: one line per product for exactly the issued quantity.
    async fn receive(
        &self,
        destination: &str,
        issued: &[IssuedLine],
    ) -> Result<i64, ServiceError> {
        let document_id = self
            .client
            .create_document(&self.warehouse_id, DocumentType::Receipt)
            .await?;
        for line in issued {
            self.add_item(
                document_id,
                line.product_id,
                line.issued,
                Some(destination),
                None,
            )
            .await?;
        }
        self.client.confirm_document(document_id).await?;
        Ok(document_id)
    }

    /// Compensating receipt: every issued slice goes back to its source.
    async fn compensate(&self, issued: &[IssuedLine]) -> Result<i64, ServiceError> {
        let document_id = self
            .client
            .create_document(&self.warehouse_id, DocumentType::Receipt)
            .await?;
        for line in issued {
            for source in &line.sources {
                match source {
                    IssueSource::Bin { location, quantity } => {
                        self.add_item(document_id, line.product_id, *quantity, Some(location), None)
                            .await?;
                    }
                    IssueSource::Unallocated { quantity, batch } => {
                        self.add_item(document_id, line.product_id, *quantity, None, batch.as_ref())
                            .await?;
                    }
                }
            }
        }
        self.client.confirm_document(document_id).await?;
        Ok(document_id)
    }

    async fn add_item(
        &self,
        document_id: i64,
        product_id: i64,
        quantity: u32,
        location: Option<&str>,
        tag: Option<&BatchTag>,
    ) -> Result<(), ServiceError> {
        let params = AddDocumentItemParams {
            document_id,
            product_id,
            quantity,
            location: location.map(str::to_string),
            batch: tag.and_then(|t| t.batch.clone()),
            expiry_date: tag.and_then(|t| t.expiry_date),
            price: tag.and_then(|t| t.price),
        };
        self.client.add_document_item(&params).await
    }
}

/// FEFO ordering: ascending expiry, undated units last.
pub(crate) fn fefo_order(mut units: Vec<ErpUnit>) -> Vec<ErpUnit> {
    units.sort_by_key(|u| (u.expiry_date.is_none(), u.expiry_date));
    units
}

fn record_failure(
    failures: &mut Vec<LineFailure>,
    line: &MoveLine,
    quantity: u32,
    source: &str,
    err: &ServiceError,
) {
    failures.push(LineFailure {
        sku: line.sku.clone(),
        product_id: line.product.product_id,
        quantity,
        source: source.to_string(),
        message: err.to_string(),
        detail: err.detail(),
    });
}

fn annotate_compensated(receipt_err: ServiceError, compensation_document_id: i64) -> ServiceError {
    match receipt_err {
        ServiceError::ExternalApiError {
            method,
            code,
            message,
            detail,
        } => ServiceError::ExternalApiError {
            method,
            code,
            message: format!(
                "{message}; issued stock was returned to its sources by document {compensation_document_id}"
            ),
            detail,
        },
        other => other,
    }
}
