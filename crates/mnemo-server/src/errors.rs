//! Server error types.

/// Errors raised while starting or running the HTTP listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address that was requested.
        address: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// Socket-level failure after binding.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}
