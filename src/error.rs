use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the index and search layers.
///
/// Admission failures are not errors (see `index::ingest::SkipReason`), and
/// "no match" is an exit-code concern, not an error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    #[error("no index found at {}; run `csearch index <path>` first", .0.display())]
    IndexMissing(PathBuf),

    #[error("corrupt index: {reason}; remove the index directory and re-run `csearch index`")]
    IndexCorrupt { reason: String },

    #[error("index store: {0}")]
    Store(#[from] rocksdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::InvalidRegex(e.to_string())
    }
}

impl From<regex_syntax::Error> for Error {
    fn from(e: regex_syntax::Error) -> Self {
        Error::InvalidRegex(e.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
