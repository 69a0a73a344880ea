//! Push-based writers that serialize access to a sink.
//!
//! Every [`Writer::write`] waits its turn on a FIFO-fair lock around the
//! sink, so the sink sees one chunk at a time, in call order, and never
//! before its `start` hook has finished. [`Writer::abort`] does not wait
//! for that turn: it interrupts the write in flight.

use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::core::WriterSink;
use crate::error::{Error, Result};

/// Lifecycle of a writer. Closed and Aborted are terminal.
#[derive(Debug, Clone)]
pub enum WriterState {
    /// Accepting writes
    Open,
    /// Closed by the producer; the sink's `close` hook has run or is queued
    Closed,
    /// Aborted, or errored by its sink; writes fail with the stored reason
    Aborted(Error),
}

/// Handle given to sink hooks for failing the writer from the inside.
#[derive(Clone)]
pub struct WriterController {
    state: Arc<Mutex<WriterState>>,
}

impl WriterController {
    /// Put the writer into the aborted state with `reason`.
    ///
    /// Later writes fail with `reason`. No-op once the writer is closed or
    /// aborted.
    pub fn error(&self, reason: impl Into<Error>) {
        let mut state = self.state.lock();
        if matches!(*state, WriterState::Open) {
            let reason = reason.into();
            debug!(reason = %reason, "writer errored by its sink");
            *state = WriterState::Aborted(reason);
        }
    }
}

struct SinkSlot<T: Send + 'static> {
    sink: Box<dyn WriterSink<T>>,
    started: bool,
}

struct WriterInner<T: Send + 'static> {
    state: Arc<Mutex<WriterState>>,
    sink: TokioMutex<SinkSlot<T>>,
    controller: WriterController,
    /// Fired by [`Writer::abort`] to drop a write still in flight.
    aborted: CancellationToken,
}

impl<T: Send + 'static> WriterInner<T> {
    /// Fail fast for calls made after close or abort.
    fn check_open(&self) -> Result<()> {
        match &*self.state.lock() {
            WriterState::Open => Ok(()),
            WriterState::Closed => Err(Error::WriterClosed),
            WriterState::Aborted(reason) => Err(reason.clone()),
        }
    }

    /// The stored abort reason.
    fn reason(&self) -> Error {
        match &*self.state.lock() {
            WriterState::Aborted(reason) => reason.clone(),
            _ => Error::WriterClosed,
        }
    }

    /// Move an open writer to `Aborted(reason)`. False if it was not open.
    fn mark_aborted(&self, reason: &Error) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, WriterState::Open) {
            return false;
        }
        *state = WriterState::Aborted(reason.clone());
        drop(state);
        debug!(reason = %reason, "writer aborted");

        #[cfg(feature = "metrics")]
        crate::metrics::writer_aborted();

        true
    }

    /// Run the sink's `start` hook unless it already ran.
    async fn start(&self, slot: &mut SinkSlot<T>) -> Result<()> {
        if slot.started {
            return Ok(());
        }
        slot.started = true;
        let result = AssertUnwindSafe(slot.sink.start(&self.controller))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::panicked(panic)));
        if let Err(e) = result {
            warn!(error = %e, "writer sink start hook failed");
            self.controller.error(e.clone());
            return Err(e);
        }
        Ok(())
    }

    /// Run the sink's `abort` hook, logging any failure.
    async fn run_abort(&self, slot: &mut SinkSlot<T>, reason: &Error) {
        let result = AssertUnwindSafe(slot.sink.abort(reason))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::panicked(panic)));
        if let Err(e) = result {
            warn!(error = %e, "writer sink abort hook failed");
        }
    }
}

/// A push sink for chunks.
///
/// `Writer` is a cheap handle; clones share the same sink and state.
/// Constructors spawn the sink's `start` hook and must run inside a tokio
/// runtime.
pub struct Writer<T: Send + 'static> {
    inner: Arc<WriterInner<T>>,
}

impl<T: Send + 'static> Clone for Writer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> Writer<T> {
    /// Create a writer around `sink` and start it.
    pub fn new<S: WriterSink<T>>(sink: S) -> Self {
        let state = Arc::new(Mutex::new(WriterState::Open));
        let inner = Arc::new(WriterInner {
            state: state.clone(),
            sink: TokioMutex::new(SinkSlot {
                sink: Box::new(sink),
                started: false,
            }),
            controller: WriterController { state },
            aborted: CancellationToken::new(),
        });

        let starter = inner.clone();
        tokio::spawn(async move {
            let mut slot = starter.sink.lock().await;
            let _ = starter.start(&mut slot).await;
        });

        Self { inner }
    }

    /// Write one chunk.
    ///
    /// Waits for `start` and for every earlier write to settle. A failure of
    /// the sink's `write` hook is returned to this caller only; queued
    /// writes still run. A panic in the hook aborts the writer with
    /// [`Error::Task`].
    pub async fn write(&self, chunk: T) -> Result<()> {
        self.inner.check_open()?;

        let mut slot = self.inner.sink.lock().await;
        self.inner.start(&mut slot).await?;
        if let WriterState::Aborted(reason) = &*self.inner.state.lock() {
            return Err(reason.clone());
        }

        trace!("writing chunk to sink");
        let outcome = tokio::select! {
            biased;
            _ = self.inner.aborted.cancelled() => return Err(self.inner.reason()),
            outcome = AssertUnwindSafe(slot.sink.write(chunk, &self.inner.controller)).catch_unwind() => outcome,
        };
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let reason = Error::panicked(panic);
                warn!(error = %reason, "writer sink write hook panicked");
                if self.inner.mark_aborted(&reason) {
                    self.inner.run_abort(&mut slot, &reason).await;
                }
                Err(reason)
            }
        };

        #[cfg(feature = "metrics")]
        crate::metrics::chunk_written(result.is_ok());

        result
    }

    /// Close the writer.
    ///
    /// Writes already queued still reach the sink, then the sink's `close`
    /// hook runs once. Later writes fail with [`Error::WriterClosed`].
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            match &*state {
                WriterState::Open => *state = WriterState::Closed,
                WriterState::Closed => return Err(Error::WriterClosed),
                WriterState::Aborted(reason) => return Err(reason.clone()),
            }
        }

        let mut slot = self.inner.sink.lock().await;
        self.inner.start(&mut slot).await?;
        debug!("writer closed");
        AssertUnwindSafe(slot.sink.close())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::panicked(panic)))
    }

    /// Abort the writer with `reason` and return it.
    ///
    /// Later writes, and writes still queued, fail with `reason`. A write
    /// suspended inside the sink is dropped, then the sink's `abort` hook
    /// runs; its failure is only logged. Aborting a writer that is already
    /// closed or aborted does nothing.
    pub async fn abort(&self, reason: impl Into<Error>) -> Error {
        let reason = reason.into();
        if !self.inner.mark_aborted(&reason) {
            return reason;
        }
        self.inner.aborted.cancel();

        let mut slot = self.inner.sink.lock().await;
        if self.inner.start(&mut slot).await.is_ok() {
            self.inner.run_abort(&mut slot, &reason).await;
        }
        reason
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WriterState {
        self.inner.state.lock().clone()
    }
}
