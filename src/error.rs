//! Error types for the reader/writer system.

use std::any::Any;
use std::sync::Arc;

/// The main error type for readers, writers and pipes.
///
/// Application-supplied reasons (`Stream` and `Custom`) are stored once and
/// handed out as clones, so every pending and future caller observes the
/// same reason that was passed to `error` or `abort`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// An operation was attempted on a reader that is already closed
    #[error("Reader is closed")]
    ReaderClosed,

    /// An operation was attempted on a writer that is already closed
    #[error("Writer is closed")]
    WriterClosed,

    /// The underlying channel was closed while an operation was pending
    #[error("Channel was closed")]
    ChannelClosed,

    /// An opaque application error
    #[error("{0}")]
    Stream(Arc<dyn std::error::Error + Send + Sync>),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),

    /// A source or sink hook panicked
    #[error("Task failed: {0}")]
    Task(String),
}

impl Error {
    /// Wrap any error type as an application reason
    pub fn stream<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Stream(Arc::new(error))
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// Returns true if this is a close error raised by a reader or writer.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Error::ReaderClosed | Error::WriterClosed | Error::ChannelClosed
        )
    }

    /// Returns true if both errors carry the same reason.
    ///
    /// `Stream` reasons compare by identity, everything else by value.
    pub fn same_reason(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::Stream(a), Error::Stream(b)) => Arc::ptr_eq(a, b),
            (Error::Custom(a), Error::Custom(b)) => a == b,
            (Error::Task(a), Error::Task(b)) => a == b,
            (Error::ReaderClosed, Error::ReaderClosed)
            | (Error::WriterClosed, Error::WriterClosed)
            | (Error::ChannelClosed, Error::ChannelClosed) => true,
            _ => false,
        }
    }
}

impl Error {
    /// Turn a caught panic payload into a [`Error::Task`].
    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "hook panicked".to_string());
        Error::Task(message)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::Stream(Arc::from(e))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;
