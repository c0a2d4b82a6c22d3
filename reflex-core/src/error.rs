//! Error types for the reactive engine.

use thiserror::Error;

/// Errors raised by observed objects, computations and option loading.
#[derive(Error, Debug)]
pub enum ReactiveError {
    /// `observe` was handed a scalar; only records and sequences can be wrapped.
    #[error("cannot observe a non-aggregate value: {0}")]
    NotAnAggregate(String),

    /// A sequence was addressed with a property that is neither a canonical
    /// in-range index nor `length`.
    #[error("invalid sequence property: {0:?}")]
    InvalidIndex(String),

    /// A sequence-only operation was applied to a record.
    #[error("operation requires a sequence")]
    NotASequence,

    /// A sequence length was set to something other than a non-negative
    /// integer no larger than `MAX_LENGTH`, or could not be allocated.
    #[error("invalid sequence length: {0}")]
    InvalidLength(String),

    /// The owning `ReactiveContext` has been dropped.
    #[error("reactive context has been dropped")]
    ContextDropped,

    /// Options could not be parsed.
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
