use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted settings and single-flight state of the continuous loop for one scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncControl {
    pub scope: String,
    pub enabled: bool,
    pub interval_secs: i64,
    pub running: bool,
    /// Identifies the cycle holding the `running` flag.
    #[serde(skip_serializing, default)]
    pub cycle_token: Option<Uuid>,
    pub cycle_started_at: Option<DateTime<Utc>>,
    /// Last sign of life from the holder; staleness is judged on this.
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub last_cycle_finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
