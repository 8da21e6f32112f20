use thiserror::Error;

/// Errors from the orchestrator adapter.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The named object does not exist.
    #[error("not found: {namespace}/{name}")]
    NotFound { namespace: String, name: String },

    /// Exec into a container failed. Callers that read device bindings
    /// via exec fall back to the unknown sentinel on this variant.
    #[error("exec failed for {namespace}/{name}: {message}")]
    Exec {
        namespace: String,
        name: String,
        message: String,
    },

    /// Any other orchestrator API failure.
    #[error("cluster api error: {0}")]
    Api(String),
}
