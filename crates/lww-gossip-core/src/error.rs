//! Error types for lww-gossip

use thiserror::Error;

/// Reasons a single inbound gossip item is refused
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Neither a record nor a positional tuple
    #[error("expected an object or a 4-element array, found {0}")]
    NotAnEntry(String),

    /// Positional form with the wrong number of elements
    #[error("positional entry must have 4 elements, found {0}")]
    WrongArity(usize),

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Field present but not coercible to the expected type
    #[error("field `{field}` is not {expected}: {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: String,
    },

    /// Float normalization error (NaN or Inf)
    #[error("field `{0}` is not a finite number")]
    NonFinite(&'static str),
}

/// An item skipped during receive, with its position in the batch
#[derive(Debug, Clone, PartialEq, Error)]
#[error("item {index}: {error}")]
pub struct RejectedItem {
    pub index: usize,
    #[source]
    pub error: ValidationError,
}
