//! Error types for ring membership, lookup and routing.

/// Errors returned by the ring itself.
///
/// All of them are caller errors or "no capacity" conditions: the ring never
/// retries internally and never swallows them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    /// Lookup on a ring without members.
    #[error("ring has no members")]
    EmptyRing,

    /// The node is already part of the ring.
    #[error("node already a ring member: {0}")]
    AlreadyMember(String),

    /// The node is not part of the ring.
    #[error("node not found in ring: {0}")]
    NotFound(String),

    /// The ring cannot be built with the given settings.
    #[error("invalid ring configuration: {0}")]
    InvalidConfig(String),
}

/// Errors reported by a cache backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer in time.
    #[error("backend timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The pattern passed to a key scan is malformed.
    #[error("invalid key pattern: {0}")]
    InvalidPattern(String),
}

/// Errors produced while routing a key operation to its backend.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The ring could not select a node.
    #[error(transparent)]
    Ring(#[from] RingError),

    /// The selected backend failed.
    #[error("backend {node} failed: {source}")]
    Backend {
        /// Node whose backend failed.
        node: String,
        #[source]
        source: BackendError,
    },

    /// The ring selected a node that has no backend attached.
    #[error("no backend attached for node: {0}")]
    MissingBackend(String),
}
