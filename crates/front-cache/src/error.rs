//! Error types for the cache.

/// Errors that can occur while configuring or running a [`Cache`](crate::Cache).
///
/// Lookups themselves never fail: a failed fetch is represented by an empty
/// value and cached like any other.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load configuration from file or environment.
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// No Tokio runtime is available to run the expiry scheduler.
    #[error("no tokio runtime available")]
    RuntimeUnavailable,

    /// The expiry scheduler is no longer running.
    #[error("expiry scheduler stopped")]
    SchedulerStopped,
}

impl CacheError {
    /// Creates a new invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
