use thiserror::Error;

/// Enumeration of errors returned by queue and store operations.
///
/// A failed operation never leaves partial effects behind: entry writes and
/// counter updates travel in one atomic batch, so a rejected batch applies
/// nothing.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The queue name failed validation. Raised synchronously by
    /// [`Store::get_queue`](crate::Store::get_queue), never by operations on
    /// an already-obtained handle.
    #[error("invalid queue name: {0:?}")]
    InvalidName(String),

    /// The backing store rejected or could not complete an operation.
    #[error("{command} failed with: {error}")]
    Store {
        command: &'static str,
        error: rocksdb::Error,
    },

    /// A stored entry key did not decode. Indicates on-disk corruption or a
    /// foreign writer; surfaced rather than silently skipped.
    #[error("corrupt entry key: {0}")]
    CorruptKey(String),

    /// A column family this crate opened is missing from the handle. Only
    /// reachable if the database was reopened behind our back.
    #[error("missing column family: {0}")]
    MissingColumnFamily(&'static str),
}

impl QueueError {
    pub(crate) fn store(command: &'static str) -> impl FnOnce(rocksdb::Error) -> QueueError {
        move |error| QueueError::Store { command, error }
    }
}
