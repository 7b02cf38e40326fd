use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One remote shop the engine pulls orders from. Identity is the URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    #[serde(skip_serializing)]
    pub consumer_key: String,
    #[serde(skip_serializing)]
    pub consumer_secret: String,
    pub label: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    pub fn new(url: &str, consumer_key: &str, consumer_secret: &str) -> Self {
        let now = Utc::now();
        Self {
            url: url.trim_end_matches('/').to_owned(),
            consumer_key: consumer_key.to_owned(),
            consumer_secret: consumer_secret.to_owned(),
            label: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_owned());
        self
    }

    /// Label if present, otherwise the URL.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.url)
    }
}
