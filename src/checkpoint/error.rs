//! Snapshot error types.

use thiserror::Error;

/// Errors that can occur while saving or restoring a process instance
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot does not fit the graph supplied at restore time
    #[error("Snapshot does not match process graph: {0}")]
    SerializationMismatch(String),

    /// Encoding to JSON or binary format failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Decoding from JSON or binary format failed
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Snapshot version is not supported by this version
    #[error("Unsupported snapshot version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}
