//! Error kinds shared by every stage of the consensus engine (spec §7).

use thiserror::Error;

/// The five fatal-error kinds the core can raise.
///
/// `InputFormat` and `SortOrder` carry the offending record's identifier so that callers can
/// report it without re-deriving context; `Internal` indicates a broken invariant rather than bad
/// input and should never be caught and retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed input record {record}: {reason}")]
    InputFormat { record: String, reason: String },

    #[error("sort order mismatch: BAM declares {declared:?}, pipeline configured for {expected:?}")]
    SortOrder { declared: String, expected: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
