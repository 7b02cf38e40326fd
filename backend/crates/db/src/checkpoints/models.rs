use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-source watermarks bounding the next sweeps.
///
/// A missing watermark means the full history must be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub source_url: String,
    pub last_created_seen: Option<DateTime<Utc>>,
    pub last_modified_seen: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn empty(source_url: &str) -> Self {
        Self {
            source_url: source_url.to_owned(),
            last_created_seen: None,
            last_modified_seen: None,
            updated_at: None,
        }
    }
}
