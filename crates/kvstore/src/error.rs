//! Error types for KV store operations.
//!
//! A missing key is not an error: `get` returns `None` and `list` returns an
//! empty map. Everything here means the store could not answer.

/// Result type alias for KV store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a KV store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store could not be reached or the request timed out.
    #[error("KV store unreachable at {address}: {message}")]
    Unreachable {
        /// Address of the store.
        address: String,
        /// Transport error message.
        message: String,
    },

    /// The store answered with an unexpected HTTP status.
    #[error("KV request for {key} failed with HTTP {status}")]
    Status {
        /// Key or prefix requested.
        key: String,
        /// HTTP status code.
        status: u16,
    },

    /// The store answered with a body that could not be read.
    #[error("invalid KV response for {key}: {message}")]
    InvalidResponse {
        /// Key or prefix requested.
        key: String,
        /// Error message.
        message: String,
    },

    /// The value could not be encoded for writing.
    #[error("could not encode value for {key}: {source}")]
    Encode {
        /// Key being written.
        key: String,
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Create an unreachable error.
    pub fn unreachable(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Whether the failure happened before the store produced any answer.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}
