use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// Append-only record of one orchestrator pass over one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub source_url: String,
    pub status: RunStatus,
    pub new_orders: i64,
    pub updated_orders: i64,
    pub pages: i64,
    pub duration_ms: i64,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunFilter {
    pub source: Option<String>,
    pub limit: Option<i64>,
}

impl RunFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 500;

    /// Requested limit clamped to `1..=MAX_LIMIT`.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_str() {
        for status in [RunStatus::Success, RunStatus::Error] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!("running".parse::<RunStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&RunStatus::Error).unwrap();
        assert_eq!(json, "\"error\"");
    }

    #[test]
    fn filter_limit_is_clamped() {
        assert_eq!(RunFilter::default().effective_limit(), 50);
        let big = RunFilter {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(big.effective_limit(), 500);
        let zero = RunFilter {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.effective_limit(), 1);
    }
}
