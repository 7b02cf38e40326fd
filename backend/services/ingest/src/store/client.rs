use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use ordersync_db::sources::models::Source;

use super::models::RemoteOrder;
use super::query::{PageQuery, ORDERS_PATH};

/// Upper bound on a server-requested wait.
const MAX_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP {status}: {body}")]
    Http {
        status: StatusCode,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl SourceError {
    /// Whether the same request may succeed if repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Decode(_) => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// One page of orders from a remote source. A single attempt per call.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_page(
        &self,
        source: &Source,
        query: &PageQuery,
    ) -> Result<Vec<RemoteOrder>, SourceError>;
}

#[derive(Clone)]
pub struct StoreClient {
    client: Client,
}

impl StoreClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl OrderSource for StoreClient {
    async fn fetch_page(
        &self,
        source: &Source,
        query: &PageQuery,
    ) -> Result<Vec<RemoteOrder>, SourceError> {
        let url = format!("{}{}", source.url, ORDERS_PATH);

        let response = self
            .client
            .get(&url)
            .basic_auth(&source.consumer_key, Some(&source.consumer_secret))
            .query(&query.params())
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(%url, %status, error = %e, "failed to read error body");
                    String::new()
                }
            };
            return Err(SourceError::Http {
                status,
                body,
                retry_after,
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<Vec<RemoteOrder>>(&body)
            .map_err(|e| SourceError::Decode(format!("page {}: {e}", query.page)))
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
}
