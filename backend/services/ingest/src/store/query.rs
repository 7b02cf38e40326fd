use std::fmt;

use chrono::{DateTime, Utc};

/// Versioned orders collection, relative to a source URL.
pub const ORDERS_PATH: &str = "/wp-json/wc/v3/orders";

/// Nested sub-objects requested inline instead of as separate fetches.
pub const EXPAND: &str = "line_items,shipping_lines,tax_lines,fee_lines,coupon_lines,refunds";

/// Lower bound applied to one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepFilter {
    /// First-ever sync: no bound.
    None,
    CreatedAfter(DateTime<Utc>),
    ModifiedAfter(DateTime<Utc>),
}

impl SweepFilter {
    pub fn bound(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::None => None,
            Self::CreatedAfter(ts) | Self::ModifiedAfter(ts) => Some(*ts),
        }
    }

    /// Sort direction on the filtered timestamp.
    pub fn direction(&self) -> &'static str {
        match self {
            Self::None | Self::CreatedAfter(_) => "asc",
            Self::ModifiedAfter(_) => "desc",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "full",
            Self::CreatedAfter(_) => "created_after",
            Self::ModifiedAfter(_) => "modified_after",
        }
    }
}

impl fmt::Display for SweepFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound() {
            Some(ts) => write!(f, "{} {}", self.label(), ts.to_rfc3339()),
            None => f.write_str(self.label()),
        }
    }
}

/// One page request within a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub filter: SweepFilter,
    pub page: u32,
    pub per_page: u32,
}

impl PageQuery {
    /// Query-string parameters for this page.
    ///
    /// Creation sweeps run oldest first: new orders land after the last page.
    /// Modification sweeps run newest first: an order modified mid-sweep jumps
    /// to the front, so later pages see duplicates rather than gaps.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
            ("order", self.filter.direction().to_string()),
            ("dates_are_gmt", "true".to_string()),
            ("_expand", EXPAND.to_string()),
        ];

        match self.filter {
            SweepFilter::None => params.push(("orderby", "date".to_string())),
            SweepFilter::CreatedAfter(ts) => {
                params.push(("orderby", "date".to_string()));
                params.push(("after", format_bound(ts)));
            }
            SweepFilter::ModifiedAfter(ts) => {
                params.push(("orderby", "modified".to_string()));
                params.push(("modified_after", format_bound(ts)));
            }
        }

        params
    }
}

/// ISO-8601 without offset, the form the remote compares against its GMT dates.
fn format_bound(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}
