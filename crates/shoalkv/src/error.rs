//! Unified error type for engine operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;

/// Everything a [`Store`](crate::Store) operation can fail with.
///
/// Key absence is not an error: `get` returns `Ok(None)` and `remove`
/// returns `Ok(false)`. Likewise a torn trailing record found at open is
/// recovered transparently, not reported.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A file in the database directory whose name does not parse as a
    /// decimal segment id.
    #[error("not a segment file: {0:?}")]
    CorruptDirectory(PathBuf),

    /// A positional read against a live directory entry came up short,
    /// which means the segment was corrupted outside the engine.
    #[error("short read at offset {offset}: wanted {wanted} bytes")]
    ShortRead { offset: u64, wanted: usize },

    /// The caller passed one of the reserved sentinel byte strings as a
    /// value.
    #[error("value is reserved for internal use")]
    ReservedValue,

    #[error("compaction is not implemented")]
    NotImplemented,
}

impl From<logfile::LogError> for StoreError {
    fn from(e: logfile::LogError) -> Self {
        match e {
            logfile::LogError::Io(e) => StoreError::Io(e),
            logfile::LogError::ShortRead { offset, wanted } => {
                StoreError::ShortRead { offset, wanted }
            }
        }
    }
}
