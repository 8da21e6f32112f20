use thiserror::Error;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("registry request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The registry answered with a non-success status.
    #[error("registry returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Attach/detach called on a client built without a mutation endpoint.
    #[error("registry client has no mutation endpoint configured")]
    MutationUnsupported,
}

impl PoolError {
    /// Whether the registry rejected the request (as opposed to the
    /// request never completing). Rejections are not worth retrying
    /// with the same arguments.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}
