//! Cache-aware analytics queries.
//!
//! Every read goes cache → batcher → retry → fetcher, and the fetched value
//! is cached once by whichever caller actually performed the fetch.

use crate::config::GaugeConfig;
use crate::fetcher::{DataFetcher, HttpFetcher};
use crate::models::{
    format_instant_for_api, AttributionSort, AuditLogQuery, BudgetConfig, CostTracking, SortOrder,
    AUDIT_LOGS,
};
use crate::pages::{sort_newest_first, Page, PageCursor, PageOptions, PageProgress};
use crate::retry::{retry, retry_with, RetryPolicy};
use chrono::Duration;
use gauge_cache::{FileStore, MemoryStore, QueryKey, RequestBatcher, ResultCache, SnapshotStore};
use gauge_core::{
    format_date_for_api, validate_range, BudgetStatus, BudgetThresholds, DateRange, ErrorKind,
    GaugeError, GaugeResult, SharedClock,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// TTL for the overview query.
pub const OVERVIEW_TTL_MS: i64 = 120_000;

/// Dashboard-facing query API.
///
/// Construct once per process and share; the cache and the pending-request
/// table live inside.
pub struct AnalyticsQueries {
    cache: Arc<ResultCache<Value>>,
    batcher: RequestBatcher<Value, GaugeError>,
    fetcher: Arc<dyn DataFetcher>,
    retry: RetryPolicy,
    thresholds: BudgetThresholds,
    clock: SharedClock,
}

impl std::fmt::Debug for AnalyticsQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsQueries")
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

impl AnalyticsQueries {
    pub fn new(
        cache: Arc<ResultCache<Value>>,
        fetcher: Arc<dyn DataFetcher>,
        retry: RetryPolicy,
        clock: SharedClock,
    ) -> Self {
        Self {
            cache,
            batcher: RequestBatcher::new(),
            fetcher,
            retry,
            thresholds: BudgetThresholds::default(),
            clock,
        }
    }

    /// Alert thresholds used by [`budget_status`](Self::budget_status).
    pub fn with_thresholds(mut self, thresholds: BudgetThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Wire up the HTTP fetcher and a snapshot store from configuration.
    pub fn from_config(config: &GaugeConfig, clock: SharedClock) -> GaugeResult<Self> {
        let store: Arc<dyn SnapshotStore> = match &config.cache.snapshot_dir {
            Some(dir) => match FileStore::open(dir) {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!(error = %e, "snapshot directory unusable, caching in memory only");
                    Arc::new(MemoryStore::new())
                }
            },
            None => Arc::new(MemoryStore::new()),
        };
        let cache = Arc::new(ResultCache::new(
            config.cache.to_cache_config(),
            store,
            Arc::clone(&clock),
        ));
        let fetcher = Arc::new(HttpFetcher::new(
            &config.api_base_url,
            config.request_timeout(),
        )?);
        Ok(Self::new(cache, fetcher, config.retry, clock)
            .with_thresholds(config.budget.thresholds()))
    }

    pub fn cache(&self) -> &Arc<ResultCache<Value>> {
        &self.cache
    }

    /// Run `query`, caching its raw result for `ttl` (or the cache default).
    pub async fn query_raw(&self, query: &QueryKey, ttl: Option<Duration>) -> GaugeResult<Value> {
        self.fetch_cached(query.cache_key(), query.clone(), ttl).await
    }

    /// Run `query` and decode the result.
    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &QueryKey,
        ttl: Option<Duration>,
    ) -> GaugeResult<T> {
        let value = self.query_raw(query, ttl).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Look up `key`, or fetch `request` once across all concurrent callers.
    ///
    /// `key` and `request` differ only when the cache key must carry a
    /// default the server does not need to see.
    async fn fetch_cached(
        &self,
        key: String,
        request: QueryKey,
        ttl: Option<Duration>,
    ) -> GaugeResult<Value> {
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let fetcher = Arc::clone(&self.fetcher);
        let cache = Arc::clone(&self.cache);
        let policy = self.retry;
        let cache_key = key.clone();

        self.batcher
            .execute(&key, move || async move {
                let value = retry(&policy, || fetcher.fetch(&request)).await?;
                match ttl {
                    Some(ttl) => cache.set_with_ttl(cache_key, value.clone(), ttl),
                    None => cache.set(cache_key, value.clone()),
                }
                Ok(value)
            })
            .await
    }

    /// Dashboard overview for `month` (`YYYY-MM`), or the current month.
    pub async fn overview(&self, month: Option<&str>) -> GaugeResult<Value> {
        let key = QueryKey::new("overview")
            .param("month", month.unwrap_or("current"))
            .cache_key();
        let request = QueryKey::new("overview").param_opt("month", month);
        self.fetch_cached(key, request, Some(Duration::milliseconds(OVERVIEW_TTL_MS)))
            .await
    }

    /// Cost tracking for `month` (`YYYY-MM`), or the current month.
    pub async fn cost_tracking(&self, month: Option<&str>) -> GaugeResult<CostTracking> {
        let key = QueryKey::new("cost-tracking")
            .param("month", month.unwrap_or("current"))
            .cache_key();
        let request = QueryKey::new("cost-tracking").param_opt("month", month);
        let value = self.fetch_cached(key, request, None).await?;
        Ok(CostTracking::from_wire(&value))
    }

    /// Cost tracking for `month` classified against the local thresholds.
    pub async fn budget_status(&self, month: Option<&str>) -> GaugeResult<BudgetStatus> {
        let tracking = self.cost_tracking(month).await?;
        Ok(tracking.snapshot().status(&self.thresholds))
    }

    pub async fn budget_config(&self) -> GaugeResult<BudgetConfig> {
        let query = QueryKey::new("budget-config");
        let value = self.query_raw(&query, None).await?;
        Ok(BudgetConfig::from_wire(&value))
    }

    /// Per-user usage between the two dates, inclusive.
    pub async fn user_attribution(
        &self,
        range: DateRange,
        sort: Option<AttributionSort>,
        order: Option<SortOrder>,
    ) -> GaugeResult<Vec<Value>> {
        validate_range(range.start, range.end, self.clock.now())?;

        let query = QueryKey::new("user-attribution")
            .param("startDate", format_date_for_api(range.start))
            .param("endDate", format_date_for_api(range.end))
            .param_opt("sortBy", sort.map(|s| s.as_str()))
            .param_opt("order", order.map(|o| o.as_str()));
        let value = self.query_raw(&query, None).await?;

        match value.get("users") {
            Some(Value::Array(users)) => Ok(users.clone()),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(GaugeError::operation(
                ErrorKind::Serialization,
                format!("expected users array, got {}", other),
            )),
        }
    }

    /// Audit log entries matching `filter`, from a single request.
    pub async fn audit_logs(&self, filter: &AuditLogQuery) -> GaugeResult<Vec<Value>> {
        if let Some(range) = filter.range {
            validate_range(range.start, range.end, self.clock.now())?;
        }
        let value = self.query_raw(&filter.to_query(), None).await?;
        Ok(Page::from_wire(&value, "logs")?.items)
    }

    /// Every audit log entry in `range`, newest first.
    pub async fn fetch_all_audit_logs<P>(
        &self,
        range: DateRange,
        options: PageOptions,
        on_progress: P,
    ) -> GaugeResult<Vec<Value>>
    where
        P: FnMut(&PageProgress),
    {
        validate_range(range.start, range.end, self.clock.now())?;
        let query = QueryKey::new(AUDIT_LOGS)
            .param("startDate", format_instant_for_api(range.start))
            .param("endDate", format_instant_for_api(range.end));
        self.fetch_all_pages(&query, "logs", options, on_progress).await
    }

    /// Every broker's usage in `range`, across all pages.
    pub async fn fetch_all_broker_attribution<P>(
        &self,
        range: DateRange,
        options: PageOptions,
        on_progress: P,
    ) -> GaugeResult<Vec<Value>>
    where
        P: FnMut(&PageProgress),
    {
        validate_range(range.start, range.end, self.clock.now())?;
        let query = QueryKey::new("user-attribution")
            .param("startDate", format_instant_for_api(range.start))
            .param("endDate", format_instant_for_api(range.end));
        self.fetch_all_pages(&query, "brokers", options, on_progress).await
    }

    /// Collect every item of a paginated list query.
    ///
    /// Each page is requested with `limit` plus the `cursor` or `offset`
    /// the previous page reported, and is retried on its own under the
    /// retry policy. Walking stops on an empty page, when the server
    /// reports no more, or once `options.max_records` items are collected.
    /// `on_progress` runs after every non-empty page. Pages bypass the
    /// cache.
    pub async fn fetch_all_pages<P>(
        &self,
        query: &QueryKey,
        items_field: &str,
        options: PageOptions,
        mut on_progress: P,
    ) -> GaugeResult<Vec<Value>>
    where
        P: FnMut(&PageProgress),
    {
        let mut items: Vec<Value> = Vec::new();
        let mut position = PageCursor::Start;
        let mut page_number = 0;

        loop {
            let limit = options.limit_for(items.len());
            if limit == 0 {
                break;
            }
            page_number += 1;

            let request = query.clone().param("limit", limit as u64);
            let request = match &position {
                PageCursor::Start => request,
                PageCursor::Cursor(cursor) => request.param("cursor", cursor.as_str()),
                PageCursor::Offset(offset) => request.param("offset", *offset as u64),
            };

            let value = retry_with(
                &self.retry,
                || self.fetcher.fetch(&request),
                |attempt, err| {
                    debug!(page = page_number, attempt, error = %err, "page fetch failed")
                },
            )
            .await?;
            let page = Page::from_wire(&value, items_field)?;
            if page.items.is_empty() {
                break;
            }

            let next = page.next_cursor(items.len() + page.items.len());
            items.extend(page.items);
            items.truncate(options.max_records);

            let progress = PageProgress {
                page: page_number,
                fetched: items.len(),
                total: page.total,
            };
            debug!(
                name = %query.name,
                page = page_number,
                fetched = items.len(),
                "{}",
                progress.message()
            );
            on_progress(&progress);

            if !page.has_more {
                break;
            }
            position = next;
        }

        info!(
            name = %query.name,
            pages = page_number,
            fetched = items.len(),
            "paginated fetch complete"
        );
        sort_newest_first(&mut items);
        Ok(items)
    }

    /// Save budget settings, then drop every cached budget and
    /// cost-tracking result.
    pub async fn update_budget_config(&self, config: &BudgetConfig) -> GaugeResult<()> {
        let query = QueryKey::new("budget-config");
        self.fetcher.submit(&query, &config.to_wire()).await?;
        info!(monthly_limit = config.monthly_limit, "budget config updated");
        self.invalidate_budget_queries();
        Ok(())
    }

    fn invalidate_budget_queries(&self) {
        for pattern in ["^budget", "^cost-tracking"] {
            match Regex::new(pattern) {
                Ok(re) => {
                    let removed = self.cache.invalidate_pattern(&re);
                    debug!(pattern, removed, "invalidated cached queries");
                }
                Err(e) => warn!(error = %e, pattern, "bad invalidation pattern"),
            }
        }
    }
}
