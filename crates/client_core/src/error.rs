//! Error types surfaced by the coordination layer.

use std::sync::Arc;

use thiserror::Error;

/// Failure of one remote operation, as carried by error outcomes.
///
/// Cloneable so the same failure can be logged, reduced into view state and
/// forwarded to a UI thread.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed: {cause:#}")]
pub struct RemoteCallError {
    operation: &'static str,
    cause: Arc<anyhow::Error>,
}

impl RemoteCallError {
    pub fn new(operation: &'static str, cause: anyhow::Error) -> Self {
        Self {
            operation,
            cause: Arc::new(cause),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

pub(crate) trait RemoteResultExt<T> {
    fn remote(self, operation: &'static str) -> Result<T, RemoteCallError>;
}

impl<T> RemoteResultExt<T> for anyhow::Result<T> {
    fn remote(self, operation: &'static str) -> Result<T, RemoteCallError> {
        self.map_err(|cause| RemoteCallError::new(operation, cause))
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid server url '{value}': {source}")]
    InvalidServerUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("unsupported server url scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("coordinator is not running")]
    CoordinatorStopped,
}
