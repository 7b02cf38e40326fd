use ordersync_common::error::SyncError;
use serde::Deserialize;

/// Shortest loop interval accepted from the control surface.
pub const MIN_INTERVAL_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub enabled: Option<bool>,
    pub interval_secs: Option<i64>,
}

impl UpdateSettingsRequest {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.enabled.is_none() && self.interval_secs.is_none() {
            return Err(SyncError::Validation(
                "at least one of enabled, interval_secs is required".to_string(),
            ));
        }
        if let Some(secs) = self.interval_secs {
            if secs < MIN_INTERVAL_SECS {
                return Err(SyncError::Validation(format!(
                    "interval_secs must be at least {MIN_INTERVAL_SECS}, got {secs}"
                )));
            }
        }
        Ok(())
    }
}
