//! Persistence errors.

use thiserror::Error;

/// Errors raised by key-value backends and the settings store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite connection or query failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be encoded or decoded.
    #[error("failed to encode value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backend refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A settings update carried an out-of-range value.
    #[error("invalid value for {field}: {reason}")]
    InvalidSetting {
        field: &'static str,
        reason: String,
    },
}

impl StoreError {
    /// Creates a serialization error for `key`.
    pub fn serialize(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialize {
            key: key.into(),
            source,
        }
    }

    /// Creates an invalid-setting error.
    pub fn invalid_setting(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            reason: reason.into(),
        }
    }
}
