use thiserror::Error;

/// Custom error type for all terrapoint operations.
///
/// Each variant describes one category of failure so callers can handle
/// them precisely:
///
/// - [`TerrainError::Validation`] — a record or argument failed validation
///   (missing required coordinates, over-long zone/classification, bad area
///   name). During bulk loads the variant carries the 0-based ordinal of the
///   offending record so the caller can resume from the last good position.
/// - [`TerrainError::SingularFit`] — the least-squares plane fit was
///   underdetermined or degenerate (fewer than 3 independent neighbors, or
///   all neighbors colinear).
/// - [`TerrainError::Index`] — a spatial index invariant violation, such as
///   inserting a duplicate id or removing an absent one.
/// - [`TerrainError::Store`] / [`TerrainError::Io`] — failures from the
///   underlying transactional store or the filesystem. These always abort
///   the enclosing transaction and are surfaced, never retried.
/// - [`TerrainError::Cancelled`] — cooperative cancellation was honored
///   mid-operation; any open transaction has been rolled back.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// A record or argument failed validation.
    #[error("validation error{}: {message}", fmt_ordinal(.ordinal))]
    Validation {
        /// 0-based position of the offending record within the input
        /// sequence, when the failure concerns one record of a bulk load.
        ordinal: Option<u64>,
        message: String,
    },

    /// The plane fit normal equations are not solvable.
    #[error("singular plane fit: {0}")]
    SingularFit(String),

    /// A spatial index invariant was violated.
    #[error("spatial index error: {0}")]
    Index(String),

    /// The underlying transactional store failed.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Filesystem failure while opening or managing a store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was cancelled cooperatively.
    #[error("operation cancelled")]
    Cancelled,
}

fn fmt_ordinal(ordinal: &Option<u64>) -> String {
    match ordinal {
        Some(o) => format!(" at record {}", o),
        None => String::new(),
    }
}

impl TerrainError {
    /// Creates a validation error that is not tied to a record ordinal.
    pub fn validation(message: impl Into<String>) -> Self {
        TerrainError::Validation {
            ordinal: None,
            message: message.into(),
        }
    }

    /// Creates a validation error for the record at the given 0-based
    /// ordinal within a bulk load.
    pub fn validation_at(ordinal: u64, message: impl Into<String>) -> Self {
        TerrainError::Validation {
            ordinal: Some(ordinal),
            message: message.into(),
        }
    }

    /// Creates a spatial index error.
    pub fn index(message: impl Into<String>) -> Self {
        TerrainError::Index(message.into())
    }

    /// Creates a singular fit error.
    pub fn singular_fit(message: impl Into<String>) -> Self {
        TerrainError::SingularFit(message.into())
    }

    /// Returns `true` if this error is the cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TerrainError::Cancelled)
    }

    /// Returns the record ordinal for validation errors raised during a
    /// bulk load, if any.
    pub fn ordinal(&self) -> Option<u64> {
        match self {
            TerrainError::Validation { ordinal, .. } => *ordinal,
            _ => None,
        }
    }
}

/// A result type alias for terrapoint operations.
///
/// All fallible terrapoint operations return this type.
pub type TerrainResult<T> = Result<T, TerrainError>;
