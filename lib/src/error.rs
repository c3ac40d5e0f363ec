use thiserror::Error;

pub type WorkloadResult<T> = std::result::Result<T, WorkloadError>;

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("invalid option `{key}`: {reason}")]
    Config { key: String, reason: String },

    #[error("worker {worker} failed to initialize: {source:#}")]
    Initialization {
        worker: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("{operation} ran before the worker was set up")]
    NotInitialized { operation: &'static str },

    #[error("worker {worker}: {operation} expected a row but got none")]
    NoResult {
        operation: &'static str,
        worker: usize,
    },

    #[error("worker {worker}: {operation} needs a sampled flight but none was recorded yet")]
    StaleState {
        operation: &'static str,
        worker: usize,
    },

    #[error("worker {worker}: {operation} failed: {source:#}")]
    Query {
        operation: &'static str,
        worker: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl WorkloadError {
    pub(crate) fn config(key: &str, reason: impl Into<String>) -> Self {
        WorkloadError::Config {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Name of the operation that failed, if the failure happened inside one.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            WorkloadError::NotInitialized { operation }
            | WorkloadError::NoResult { operation, .. }
            | WorkloadError::StaleState { operation, .. }
            | WorkloadError::Query { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}
