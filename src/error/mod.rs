use thiserror::Error;

/// Errors surfaced by a resolution.
///
/// `Clone` because one in-flight resolution hands the same outcome to the
/// caller that started it and to every waiter that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The upstream fetch collaborator failed (network, auth, missing user...)
    #[error("Upstream Error: {0}")]
    Upstream(String),

    /// A transform invocation failed on one item of the fetched collection
    #[error("Transform Error: item {index}: {message}")]
    Transform { index: usize, message: String },

    /// Reserved; the in-memory cache has no failure modes today
    #[error("Cache Error: {0}")]
    Cache(String),

    /// Fetch timeout or a single caller's wait timeout
    #[error("Timeout Error: {0}")]
    Timeout(String),

    /// A worker or the resolution task panicked or was cancelled
    #[error("Worker Error: {0}")]
    Worker(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    Config(String),

    /// Source data could not be read or decoded
    #[error("Source Error: {0}")]
    Source(String),
}

impl From<anyhow::Error> for FetchError {
    fn from(err: anyhow::Error) -> Self {
        FetchError::Upstream(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Source(format!("JSON decode error: {}", err))
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Source(format!("I/O error: {}", err))
    }
}

impl FetchError {
    /// Whether calling `resolve` again may succeed without intervention.
    pub fn is_recoverable(&self) -> bool {
        match self {
            FetchError::Upstream(_) => true, // next call re-fetches, nothing was cached
            FetchError::Transform { .. } => false, // same data, same failure
            FetchError::Cache(_) => true,
            FetchError::Timeout(_) => true,
            FetchError::Worker(_) => true,
            FetchError::Config(_) => false,
            FetchError::Source(_) => false,
        }
    }

    /// Short machine-readable name used in JSON error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Upstream(_) => "upstream",
            FetchError::Transform { .. } => "transform",
            FetchError::Cache(_) => "cache",
            FetchError::Timeout(_) => "timeout",
            FetchError::Worker(_) => "worker",
            FetchError::Config(_) => "config",
            FetchError::Source(_) => "source",
        }
    }

    /// Categorizes error for logging and stats
    pub fn categorize(&self) -> ErrorCategory {
        match self {
            FetchError::Upstream(_) | FetchError::Timeout(_) => ErrorCategory::Network,
            FetchError::Transform { .. } | FetchError::Source(_) => ErrorCategory::Data,
            FetchError::Cache(_) | FetchError::Worker(_) => ErrorCategory::Infrastructure,
            FetchError::Config(_) => ErrorCategory::Configuration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Infrastructure,
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_error_message_names_item() {
        let err = FetchError::Transform {
            index: 3,
            message: "missing code".to_string(),
        };
        assert_eq!(err.to_string(), "Transform Error: item 3: missing code");
        assert_eq!(err.kind(), "transform");
        assert!(!err.is_recoverable());
        assert_eq!(err.categorize(), ErrorCategory::Data);
    }

    #[test]
    fn test_anyhow_converts_to_upstream() {
        let err: FetchError = anyhow::anyhow!("login required").into();
        assert_eq!(err, FetchError::Upstream("login required".to_string()));
        assert!(err.is_recoverable());
        assert_eq!(err.categorize(), ErrorCategory::Network);
    }
}
