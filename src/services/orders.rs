//! Order resolution against the remote platform.
//!
//! Callers hand us either the platform's own order id (fast path) or the
//! human order number. Order numbers are not unique — they get reused, and
//! manually created orders have none at all — so number resolution may fall
//! back to a paginated scan over escalating time windows.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::errors::ServiceError;
use crate::platform::types::{GetOrdersParams, Order};
use crate::platform::PlatformClient;

/// Base lookback windows, in days. Each window is scanned completely before
/// escalating to the next; the last one is clamped to the configured cap.
const SCAN_WINDOWS_DAYS: [i64; 4] = [1, 7, 40, 365];

#[derive(Clone)]
pub struct OrderResolver {
    client: Arc<PlatformClient>,
    scan_days: i64,
    max_pages: u32,
}

impl OrderResolver {
    pub fn new(client: Arc<PlatformClient>, scan_days: i64, max_pages: u32) -> Self {
        Self {
            client,
            scan_days,
            max_pages,
        }
    }

    /// Resolves exactly one canonical order record.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        order_id: Option<&str>,
        order_number: Option<&str>,
    ) -> Result<Order, ServiceError> {
        let order_id = order_id.map(str::trim).filter(|s| !s.is_empty());
        let order_number = order_number.map(str::trim).filter(|s| !s.is_empty());

        if let Some(raw_id) = order_id {
            let id = raw_id.parse::<i64>().map_err(|_| {
                ServiceError::InvalidInput(format!("order_id '{raw_id}' is not numeric"))
            })?;
            return self.fetch_by_id(id).await;
        }

        let number = order_number.ok_or_else(|| {
            ServiceError::InvalidInput("provide order_id or order_number".to_string())
        })?;

        // Fast path: the platform's own filter. A remote failure here is
        // swallowed on purpose; the scan below is the fallback strategy.
        match self.filter_by_number(number).await {
            Ok(Some(order)) => return Ok(order),
            Ok(None) => debug!(number, "direct order-number filter found nothing"),
            Err(e) => warn!(number, error = %e, "direct order-number filter failed, scanning"),
        }

        self.scan_for_number(number).await
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Order, ServiceError> {
        let params = GetOrdersParams {
            order_id: Some(id),
            ..Default::default()
        };
        self.client
            .get_orders(&params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("order {id} not found")))
    }

    async fn filter_by_number(&self, number: &str) -> Result<Option<Order>, ServiceError> {
        let params = GetOrdersParams {
            filter_order_number: Some(number.to_string()),
            get_unconfirmed_orders: Some(true),
            ..Default::default()
        };
        let orders = self.client.get_orders(&params).await?;
        let matches: Vec<Order> = orders
            .into_iter()
            .filter(|o| matches_query(o, number))
            .collect();
        Ok(pick_best(matches))
    }

    /// The scan fallback: escalating time windows, page by page, collecting
    /// every match before selecting the most recent.
    async fn scan_for_number(&self, number: &str) -> Result<Order, ServiceError> {
        let now = Utc::now().timestamp();
        for days in scan_windows(self.scan_days) {
            let date_from = now - days * 86_400;
            let mut matches = Vec::new();
            for page in 1..=self.max_pages {
                let params = GetOrdersParams {
                    date_confirmed_from: Some(date_from),
                    get_unconfirmed_orders: Some(true),
                    page: Some(page),
                    ..Default::default()
                };
                let orders = self.client.get_orders(&params).await?;
                if orders.is_empty() {
                    break;
                }
                matches.extend(orders.into_iter().filter(|o| matches_query(o, number)));
            }
            if let Some(best) = pick_best(matches) {
                debug!(number, days, order_id = best.order_id, "order found by scan");
                return Ok(best);
            }
        }
        Err(ServiceError::NotFound(format!(
            "order with number '{}' not found in the last {} day(s)",
            number, self.scan_days
        )))
    }

    /// Most recent orders for the diagnostics endpoint.
    #[instrument(skip(self))]
    pub async fn recent(&self, days: i64, limit: usize) -> Result<Vec<Order>, ServiceError> {
        let date_from = Utc::now().timestamp() - days.max(1) * 86_400;
        let mut collected = Vec::new();
        for page in 1..=self.max_pages {
            let params = GetOrdersParams {
                date_confirmed_from: Some(date_from),
                get_unconfirmed_orders: Some(true),
                page: Some(page),
                ..Default::default()
            };
            let orders = self.client.get_orders(&params).await?;
            if orders.is_empty() {
                break;
            }
            collected.extend(orders);
            if collected.len() >= limit {
                break;
            }
        }
        collected.sort_by_key(|o| std::cmp::Reverse((o.date_add, o.date_confirmed, o.order_id)));
        collected.truncate(limit);
        Ok(collected)
    }
}

/// Exact match after trimming; for orders without a number (manually created)
/// the platform id doubles as the searchable identifier.
fn matches_query(order: &Order, wanted: &str) -> bool {
    let number = order.order_number.trim();
    if number.is_empty() {
        order.order_id.to_string() == wanted
    } else {
        number == wanted
    }
}

/// Latest creation wins; ties broken by confirmation time, then id.
fn pick_best(matches: Vec<Order>) -> Option<Order> {
    matches
        .into_iter()
        .max_by_key(|o| (o.date_add, o.date_confirmed, o.order_id))
}

/// Clamps the escalation ladder to the configured cap, always ending on it.
fn scan_windows(max_days: i64) -> Vec<i64> {
    let mut windows: Vec<i64> = SCAN_WINDOWS_DAYS
        .iter()
        .copied()
        .filter(|d| *d < max_days)
        .collect();
    windows.push(max_days);
    windows
}
