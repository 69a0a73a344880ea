//! Capability traits for readers, writers and transformers.
//!
//! Each trait is a set of optional hooks. Every hook has a no-op default,
//! so an implementation only spells out the hooks it cares about.
//!
//! Hooks are never invoked concurrently with themselves for the same
//! reader or writer; the owning handle serializes them.

use std::ops::ControlFlow;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::reader::ReaderController;
use crate::writer::WriterController;

/// The producing side of a [`Reader`](crate::reader::Reader).
///
/// `start` runs once when the reader is created. `pull` then runs in a
/// loop for as long as it returns `ControlFlow::Continue` and the reader is
/// open. Because [`ReaderController::enqueue`] suspends while the reader's
/// buffer is full, a pull that enqueues stalls naturally under backpressure.
///
/// # Examples
///
/// ```rust
/// use std::ops::ControlFlow;
/// use async_trait::async_trait;
/// use pipestream::core::{ReaderSource, Result};
/// use pipestream::reader::ReaderController;
///
/// struct Countdown(u32);
///
/// #[async_trait]
/// impl ReaderSource<u32> for Countdown {
///     async fn pull(&mut self, controller: &ReaderController<u32>) -> Result<ControlFlow<()>> {
///         if self.0 == 0 {
///             controller.close();
///             return Ok(ControlFlow::Break(()));
///         }
///         controller.enqueue(self.0).await?;
///         self.0 -= 1;
///         Ok(ControlFlow::Continue(()))
///     }
/// }
/// ```
#[async_trait]
pub trait ReaderSource<T: Send + 'static>: Send + 'static {
    /// Called once before the first pull.
    ///
    /// Returning an error puts the reader into the errored state.
    async fn start(&mut self, _controller: &ReaderController<T>) -> Result<()> {
        Ok(())
    }

    /// Produce more data.
    ///
    /// The default has nothing to produce and stops the pull loop at once.
    /// Returning an error puts the reader into the errored state.
    async fn pull(&mut self, _controller: &ReaderController<T>) -> Result<ControlFlow<()>> {
        Ok(ControlFlow::Break(()))
    }

    /// Called when the consumer closes the reader. Failures are logged only.
    ///
    /// A `start` or `pull` still suspended at that point is dropped first.
    async fn cancel(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The consuming side of a [`Writer`](crate::writer::Writer).
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pipestream::core::{Result, WriterSink};
/// use pipestream::writer::WriterController;
///
/// struct LogSink;
///
/// #[async_trait]
/// impl WriterSink<String> for LogSink {
///     async fn write(&mut self, chunk: String, _controller: &WriterController) -> Result<()> {
///         println!("Logged: {}", chunk);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait WriterSink<T: Send + 'static>: Send + 'static {
    /// Called once before the first write.
    ///
    /// Returning an error aborts the writer with that reason.
    async fn start(&mut self, _controller: &WriterController) -> Result<()> {
        Ok(())
    }

    /// Consume one chunk. Errors go back to the caller of that write only.
    async fn write(&mut self, _chunk: T, _controller: &WriterController) -> Result<()> {
        Ok(())
    }

    /// Called once when the writer is closed.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once when the writer is aborted. Failures are logged only.
    ///
    /// A write still suspended at that point is dropped first and fails
    /// with the abort reason.
    async fn abort(&mut self, _reason: &Error) -> Result<()> {
        Ok(())
    }
}

/// The user logic of a [`Transformer`](crate::transformer::Transformer).
///
/// Both hooks receive the controller of the transformer's own reader and
/// emit output through [`ReaderController::enqueue`].
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pipestream::core::{Result, TransformerSource};
/// use pipestream::reader::ReaderController;
///
/// struct Doubler;
///
/// #[async_trait]
/// impl TransformerSource<i32, i32> for Doubler {
///     async fn transform(&mut self, chunk: i32, controller: &ReaderController<i32>) -> Result<()> {
///         controller.enqueue(chunk * 2).await
///     }
/// }
/// ```
#[async_trait]
pub trait TransformerSource<I, O>: Send + 'static
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Handle one incoming chunk, enqueueing zero or more outputs.
    ///
    /// The default drops the chunk.
    async fn transform(&mut self, _chunk: I, _controller: &ReaderController<O>) -> Result<()> {
        Ok(())
    }

    /// Emit any trailing output once the input side is closed.
    async fn flush(&mut self, _controller: &ReaderController<O>) -> Result<()> {
        Ok(())
    }
}
