//! Error types for decoding caller-supplied entities and trace queries.

use thiserror::Error;

/// Errors raised while decoding caller-supplied input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// The entity payload is not a service object or a pair of them.
    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    /// The trace lookup kind is neither `status` nor `responsetime`.
    #[error("invalid type: {0}")]
    InvalidTraceKind(String),
}
