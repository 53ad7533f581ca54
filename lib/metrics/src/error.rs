use thiserror::Error;
use tokio::task::JoinError;

/// Failure of a single raw counter query.
///
/// A [`ReadError`] never leaves the engine: the sampling tick that observed it
/// degrades the affected field group and carries on.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("I/O error while reading counters: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed counter source: {0}")]
    Parse(String),

    #[error("{call} failed with kern_return_t {code}")]
    Kernel { call: &'static str, code: i32 },

    #[error("{0} is unavailable")]
    Unavailable(&'static str),

    #[error("Counter query task failed: {0}")]
    Join(#[from] JoinError),
}
