use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category_prefix() {
        let err = SyncError::Database("connection reset".to_string());
        assert_eq!(err.to_string(), "database error: connection reset");

        let err = SyncError::NotFound("source: https://a.shop.test".to_string());
        assert_eq!(err.to_string(), "not found: source: https://a.shop.test");
    }
}
