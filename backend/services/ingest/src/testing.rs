//! Test doubles shared by the engine's unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;

use ordersync_db::orders::models::OrderRecord;
use ordersync_db::sources::models::Source;

use crate::pacing::Sleeper;
use crate::store::client::{OrderSource, SourceError};
use crate::store::models::RemoteOrder;
use crate::store::query::{PageQuery, SweepFilter};

pub fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

pub fn make_source(url: &str) -> Source {
    Source::new(url, "ck", "cs")
}

pub fn make_remote(
    id: i64,
    status: &str,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
) -> RemoteOrder {
    let fmt = "%Y-%m-%dT%H:%M:%S";
    RemoteOrder {
        id,
        status: status.to_string(),
        currency: Some("EUR".to_string()),
        total: Some(serde_json::Value::from("10.00")),
        customer_id: None,
        date_created: None,
        date_created_gmt: Some(created.format(fmt).to_string()),
        date_modified: None,
        date_modified_gmt: Some(modified.format(fmt).to_string()),
        billing: None,
        shipping: None,
        line_items: Some(serde_json::json!([])),
        tax_lines: None,
        shipping_lines: None,
        fee_lines: None,
        coupon_lines: None,
        refunds: None,
        extra: serde_json::Map::new(),
    }
}

pub fn make_record(source_url: &str, id: i64) -> OrderRecord {
    make_remote(id, "processing", ts(1, 0), ts(1, 0))
        .into_record(source_url)
        .unwrap()
}

/// Remote-side edit applied while a sweep is in flight.
#[derive(Clone)]
pub enum ShopChange {
    Status {
        id: i64,
        status: &'static str,
        modified: DateTime<Utc>,
    },
    Insert(RemoteOrder),
}

struct PendingChange {
    source_url: String,
    label: &'static str,
    page: u32,
    change: ShopChange,
}

#[derive(Default)]
struct ShopState {
    orders: HashMap<String, Vec<RemoteOrder>>,
    /// Scripted failures consumed one per call, per source.
    scripted: HashMap<String, VecDeque<StatusCode>>,
    /// Pages that always fail, per source.
    broken_pages: HashMap<(String, u32), StatusCode>,
    /// Sweep kinds (by filter label) that always fail, per source.
    broken_sweeps: HashMap<(String, &'static str), StatusCode>,
    pending: Vec<PendingChange>,
    calls: Vec<(String, PageQuery)>,
}

impl ShopState {
    fn apply(&mut self, source_url: &str, change: ShopChange) {
        let orders = self.orders.entry(source_url.to_string()).or_default();
        match change {
            ShopChange::Status {
                id,
                status,
                modified,
            } => {
                if let Some(order) = orders.iter_mut().find(|o| o.id == id) {
                    order.status = status.to_string();
                    order.date_modified_gmt =
                        Some(modified.format("%Y-%m-%dT%H:%M:%S").to_string());
                }
            }
            ShopChange::Insert(order) => {
                orders.retain(|o| o.id != order.id);
                orders.push(order);
            }
        }
    }
}

/// In-process stand-in for a set of remote shops.
///
/// Applies the filter strictly (`>`), sorts on the filtered timestamp in the
/// requested direction and paginates like the real orders collection.
#[derive(Clone, Default)]
pub struct FakeShop {
    state: Arc<Mutex<ShopState>>,
}

impl FakeShop {
    pub fn put(&self, source_url: &str, order: RemoteOrder) {
        self.state
            .lock()
            .unwrap()
            .apply(source_url, ShopChange::Insert(order));
    }

    /// Add `count` orders with ids starting at `first_id`, one hour apart from `start`.
    pub fn put_many(&self, source_url: &str, first_id: i64, count: i64, start: DateTime<Utc>) {
        for i in 0..count {
            let at = start + chrono::Duration::hours(i);
            self.put(source_url, make_remote(first_id + i, "pending", at, at));
        }
    }

    /// Change an order's status and bump its modification time.
    pub fn update_status(
        &self,
        source_url: &str,
        id: i64,
        status: &'static str,
        modified: DateTime<Utc>,
    ) {
        self.state.lock().unwrap().apply(
            source_url,
            ShopChange::Status {
                id,
                status,
                modified,
            },
        );
    }

    /// Apply `change` just before `page` of the given sweep kind is served.
    pub fn before_page(
        &self,
        source_url: &str,
        label: &'static str,
        page: u32,
        change: ShopChange,
    ) {
        self.state.lock().unwrap().pending.push(PendingChange {
            source_url: source_url.to_string(),
            label,
            page,
            change,
        });
    }

    /// The next `times` calls for the source fail with `status`.
    pub fn fail_next(&self, source_url: &str, times: usize, status: StatusCode) {
        let mut state = self.state.lock().unwrap();
        let queue = state.scripted.entry(source_url.to_string()).or_default();
        for _ in 0..times {
            queue.push_back(status);
        }
    }

    pub fn break_page(&self, source_url: &str, page: u32, status: StatusCode) {
        self.state
            .lock()
            .unwrap()
            .broken_pages
            .insert((source_url.to_string(), page), status);
    }

    /// Every request of this sweep kind fails, e.g. `"modified_after"`.
    pub fn break_sweep(&self, source_url: &str, label: &'static str, status: StatusCode) {
        self.state
            .lock()
            .unwrap()
            .broken_sweeps
            .insert((source_url.to_string(), label), status);
    }

    pub fn heal(&self, source_url: &str) {
        let mut state = self.state.lock().unwrap();
        state.broken_pages.retain(|(url, _), _| url != source_url);
        state.broken_sweeps.retain(|(url, _), _| url != source_url);
        state.scripted.remove(source_url);
    }

    pub fn calls(&self) -> Vec<(String, PageQuery)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_for(&self, source_url: &str) -> Vec<PageQuery> {
        self.calls()
            .into_iter()
            .filter(|(url, _)| url == source_url)
            .map(|(_, q)| q)
            .collect()
    }
}

fn http_error(status: StatusCode) -> SourceError {
    SourceError::Http {
        status,
        body: status.to_string(),
        retry_after: None,
    }
}

#[async_trait]
impl OrderSource for FakeShop {
    async fn fetch_page(
        &self,
        source: &Source,
        query: &PageQuery,
    ) -> Result<Vec<RemoteOrder>, SourceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((source.url.clone(), query.clone()));

        let (due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
            .into_iter()
            .partition(|p| {
                p.source_url == source.url
                    && p.label == query.filter.label()
                    && p.page == query.page
            });
        state.pending = rest;
        for p in due {
            state.apply(&source.url, p.change);
        }

        if let Some(status) = state
            .scripted
            .get_mut(&source.url)
            .and_then(|queue| queue.pop_front())
        {
            return Err(http_error(status));
        }
        if let Some(status) = state.broken_pages.get(&(source.url.clone(), query.page)) {
            return Err(http_error(*status));
        }
        if let Some(status) = state
            .broken_sweeps
            .get(&(source.url.clone(), query.filter.label()))
        {
            return Err(http_error(*status));
        }

        let mut matching: Vec<RemoteOrder> = state
            .orders
            .get(&source.url)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|o| match query.filter {
                SweepFilter::None => true,
                SweepFilter::CreatedAfter(bound) => o.created_at().map_or(true, |t| t > bound),
                SweepFilter::ModifiedAfter(bound) => o.modified_at().map_or(true, |t| t > bound),
            })
            .collect();

        match query.filter {
            SweepFilter::ModifiedAfter(_) => {
                matching.sort_by_key(|o| (o.modified_at().ok(), o.id))
            }
            _ => matching.sort_by_key(|o| (o.created_at().ok(), o.id)),
        }
        if query.filter.direction() == "desc" {
            matching.reverse();
        }

        let per_page = query.per_page as usize;
        let start = (query.page.saturating_sub(1) as usize) * per_page;
        Ok(matching.into_iter().skip(start).take(per_page).collect())
    }
}

/// Records requested delays instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
