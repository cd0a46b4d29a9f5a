use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Failure reported by an [`crate::OutputSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink is missing credentials or configuration.
    #[error("output sink unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl SinkError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}
