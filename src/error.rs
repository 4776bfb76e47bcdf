//! Error types shared across the crate.

use thiserror::Error;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors produced by the caremap core.
///
/// Data errors are returned through [`Result`]; precondition violations
/// (over-filling a builder, querying an unknown cluster id) panic instead,
/// since they indicate a caller bug rather than bad input data.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A point with a NaN or infinite coordinate was handed to an index
    /// builder. The point is not registered and does not count toward the
    /// declared item count.
    #[error("non-finite coordinate ({lon}, {lat})")]
    NonFiniteCoordinate {
        /// Longitude as received.
        lon: f64,
        /// Latitude as received.
        lat: f64,
    },

    /// The serialized index artifact does not match the item count from its
    /// companion metadata record. This is a data-integrity error: the blob
    /// and the metadata were produced by different builds or one of them
    /// was truncated or corrupted in transit.
    #[error(
        "index artifact is {actual_len} bytes but metadata count {count} requires {expected_len}"
    )]
    IndexCountMismatch {
        /// Item count declared by the metadata record.
        count: usize,
        /// Byte length a well-formed artifact for `count` items would have.
        expected_len: usize,
        /// Byte length of the supplied artifact.
        actual_len: usize,
    },

    /// The serialized index artifact is structurally invalid (bad magic,
    /// unsupported version, truncated header, or an out-of-range node
    /// reference).
    #[error("malformed index artifact: {0}")]
    MalformedIndex(String),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
