//! Unified error handling for the client.

use crate::config::ConfigError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] jsync_engine::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether the error came from the account's credentials.
    pub fn is_invalid_account(&self) -> bool {
        matches!(self, AppError::Engine(jsync_engine::Error::InvalidAccount(_)))
    }
}

/// Result type alias for the client.
pub type Result<T> = std::result::Result<T, AppError>;

/// Map a database failure into the engine's registry error.
pub(crate) fn registry_error(e: sqlx::Error) -> jsync_engine::Error {
    tracing::error!("Database error: {:?}", e);
    jsync_engine::Error::Registry(e.to_string())
}

/// Map a transport failure into the engine's HTTP error.
pub(crate) fn http_error(e: reqwest::Error) -> jsync_engine::Error {
    jsync_engine::Error::Http(e.to_string())
}
