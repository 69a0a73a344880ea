//! Pull-based readers backed by a bounded channel.
//!
//! A [`Reader`] owns one [`BoundedChannel`]. Its [`ReaderSource`] runs on a
//! dedicated task: `start` once, then `pull` in a loop, feeding the channel
//! through a [`ReaderController`]. Consumers drain the channel with
//! [`Reader::read`] or [`Reader::stream`].

use futures::FutureExt;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tokio_stream::Stream;
use tracing::{debug, trace, warn};

use crate::channel::{BoundedChannel, CloseMode};
use crate::core::ReaderSource;
use crate::error::{Error, Result};

/// Buffer capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 100;

/// Configuration for a reader's buffer
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReaderConfig {
    /// Maximum number of chunks buffered before `enqueue` suspends
    pub capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ReaderConfig {
    /// Create a config with the default capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the buffer capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Outcome of a single [`Reader::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadResult<T> {
    /// True once the reader has no more chunks to deliver
    pub done: bool,
    /// The chunk, present exactly when `done` is false
    pub value: Option<T>,
}

impl<T> ReadResult<T> {
    /// A delivered chunk
    pub fn chunk(value: T) -> Self {
        Self {
            done: false,
            value: Some(value),
        }
    }

    /// End of the sequence
    pub fn finished() -> Self {
        Self {
            done: true,
            value: None,
        }
    }

    /// Convert into `Some(chunk)` or `None` at end of sequence
    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

/// Lifecycle of a reader. Closed and Errored are terminal.
#[derive(Debug, Clone)]
pub enum ReaderState {
    /// Chunks may still arrive
    Open,
    /// Finished by the source or cancelled by the consumer
    Closed,
    /// Failed; every read returns the stored reason
    Errored(Error),
}

/// What travels through a reader's channel.
enum Message<T> {
    Chunk(T),
    Eof,
}

type CancelRequest = oneshot::Sender<()>;

struct ReaderInner<T: Send + 'static> {
    channel: BoundedChannel<Message<T>>,
    state: Mutex<ReaderState>,
    /// Cleared once the pull loop must not be re-armed.
    pulling: AtomicBool,
    /// Set once a consumer has seen the end of the sequence.
    finished: AtomicBool,
    cancel: Mutex<Option<oneshot::Sender<CancelRequest>>>,
}

impl<T: Send + 'static> ReaderInner<T> {
    /// Producer-side completion: buffered chunks stay readable.
    fn close(&self) {
        let mut state = self.state.lock();
        if !matches!(*state, ReaderState::Open) {
            return;
        }
        self.pulling.store(false, Ordering::SeqCst);
        self.channel.close_with(Message::Eof);
        *state = ReaderState::Closed;
        debug!("reader closed by its source");
    }

    /// Sticky error: buffered chunks are dropped.
    fn error(&self, reason: Error) {
        let mut state = self.state.lock();
        if !matches!(*state, ReaderState::Open) {
            return;
        }
        debug!(reason = %reason, "reader errored");
        self.pulling.store(false, Ordering::SeqCst);
        self.channel.close(CloseMode::Discard);
        *state = ReaderState::Errored(reason);

        #[cfg(feature = "metrics")]
        crate::metrics::reader_errored();
    }

    /// The result every read returns from now on, if it is already fixed.
    fn settled(&self) -> Option<Result<ReadResult<T>>> {
        if self.finished.load(Ordering::SeqCst) {
            return Some(Ok(ReadResult::finished()));
        }
        match &*self.state.lock() {
            ReaderState::Errored(reason) => Some(Err(reason.clone())),
            _ => None,
        }
    }
}

impl<T: Send + 'static> Drop for ReaderInner<T> {
    fn drop(&mut self) {
        // Releases a source still suspended in enqueue.
        self.channel.close(CloseMode::Discard);
    }
}

/// Handle through which a source (or a transformer) feeds its reader.
///
/// The controller only refers back to its reader; it does not keep the
/// reader alive. Once every [`Reader`] handle is gone, `enqueue` fails with
/// [`Error::ReaderClosed`].
pub struct ReaderController<T: Send + 'static> {
    reader: Weak<ReaderInner<T>>,
}

impl<T: Send + 'static> Clone for ReaderController<T> {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
        }
    }
}

impl<T: Send + 'static> ReaderController<T> {
    /// Push a chunk into the reader's buffer, suspending while it is full.
    ///
    /// Fails with [`Error::ReaderClosed`] if the reader is closed or errored,
    /// including when that happens while this call is suspended.
    pub async fn enqueue(&self, chunk: T) -> Result<()> {
        let channel = {
            let inner = self.reader.upgrade().ok_or(Error::ReaderClosed)?;
            if !matches!(*inner.state.lock(), ReaderState::Open) {
                return Err(Error::ReaderClosed);
            }
            inner.channel.clone()
        };

        channel
            .push(Message::Chunk(chunk))
            .await
            .map_err(|_| Error::ReaderClosed)?;
        trace!("chunk enqueued");

        #[cfg(feature = "metrics")]
        crate::metrics::chunk_enqueued();

        Ok(())
    }

    /// Signal end of the sequence. Chunks already buffered are still read.
    ///
    /// No-op if the reader is already closed or errored.
    pub fn close(&self) {
        if let Some(inner) = self.reader.upgrade() {
            inner.close();
        }
    }

    /// Put the reader into the errored state.
    ///
    /// Chunks not yet handed to a `read` are discarded, and every pending
    /// and future `read` fails with `reason`. No-op if the reader is already
    /// closed or errored.
    pub fn error(&self, reason: impl Into<Error>) {
        if let Some(inner) = self.reader.upgrade() {
            inner.error(reason.into());
        }
    }

    /// Whether the reader is still open.
    pub fn is_open(&self) -> bool {
        self.reader
            .upgrade()
            .is_some_and(|inner| matches!(*inner.state.lock(), ReaderState::Open))
    }

    fn is_pulling(&self) -> bool {
        self.reader
            .upgrade()
            .is_some_and(|inner| inner.pulling.load(Ordering::SeqCst))
    }
}

/// Stream view of a reader, see [`Reader::stream`].
pub type ReaderStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

/// A pull source of chunks with a bounded buffer.
///
/// `Reader` is a cheap handle; clones share the same buffer and state.
/// Constructors spawn the source's task and must run inside a tokio runtime.
pub struct Reader<T: Send + 'static> {
    inner: Arc<ReaderInner<T>>,
}

impl<T: Send + 'static> Clone for Reader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> Reader<T> {
    /// Create a reader with the default capacity
    pub fn new<S: ReaderSource<T>>(source: S) -> Self {
        Self::with_config(source, ReaderConfig::default())
    }

    /// Create a reader buffering at most `capacity` chunks
    pub fn with_capacity<S: ReaderSource<T>>(source: S, capacity: usize) -> Self {
        Self::with_config(source, ReaderConfig::new().capacity(capacity))
    }

    /// Create a reader from a config
    pub fn with_config<S: ReaderSource<T>>(source: S, config: ReaderConfig) -> Self {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let inner = Arc::new(ReaderInner {
            channel: BoundedChannel::new(config.capacity),
            state: Mutex::new(ReaderState::Open),
            pulling: AtomicBool::new(true),
            finished: AtomicBool::new(false),
            cancel: Mutex::new(Some(cancel_tx)),
        });
        let reader = Self { inner };

        tokio::spawn(drive_source(source, reader.controller(), cancel_rx));
        reader
    }

    /// The controller paired with this reader.
    pub(crate) fn controller(&self) -> ReaderController<T> {
        ReaderController {
            reader: Arc::downgrade(&self.inner),
        }
    }

    /// Read the next chunk.
    ///
    /// Concurrent reads resolve in call order. Once the sequence has ended
    /// every read returns `done`; once the reader has errored every read
    /// fails with the stored reason.
    pub async fn read(&self) -> Result<ReadResult<T>> {
        if let Some(settled) = self.inner.settled() {
            return settled;
        }

        match self.inner.channel.pull().await {
            Ok(Message::Chunk(chunk)) => {
                #[cfg(feature = "metrics")]
                crate::metrics::chunk_read();

                Ok(ReadResult::chunk(chunk))
            }
            Ok(Message::Eof) => {
                self.inner.finished.store(true, Ordering::SeqCst);
                Ok(ReadResult::finished())
            }
            Err(_) => self.inner.settled().unwrap_or_else(|| {
                self.inner.finished.store(true, Ordering::SeqCst);
                Ok(ReadResult::finished())
            }),
        }
    }

    /// Cancel the reader from the consumer side.
    ///
    /// Unread chunks are dropped, later reads return `done`, and the
    /// source's `cancel` hook runs if the source was still live. Calling
    /// this again, or after the reader closed or errored, does nothing.
    pub async fn close(&self) {
        let was_open = {
            let mut state = self.inner.state.lock();
            let was_open = matches!(*state, ReaderState::Open);
            if was_open {
                *state = ReaderState::Closed;
            }
            was_open
        };
        self.inner.finished.store(true, Ordering::SeqCst);
        self.inner.pulling.store(false, Ordering::SeqCst);
        self.inner.channel.close(CloseMode::Discard);

        let cancel = self.inner.cancel.lock().take();
        if let (true, Some(cancel)) = (was_open, cancel) {
            debug!("reader cancelled by consumer");
            let (done_tx, done_rx) = oneshot::channel();
            if cancel.send(done_tx).is_ok() {
                let _ = done_rx.await;
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReaderState {
        self.inner.state.lock().clone()
    }

    /// Maximum number of buffered chunks.
    pub fn capacity(&self) -> usize {
        self.inner.channel.capacity()
    }

    /// Iterate the remaining chunks as a stream.
    ///
    /// The stream ends after the sequence is done, or after yielding the
    /// reader's error once. Dropping it early leaves the reader open.
    pub fn stream(&self) -> ReaderStream<T> {
        Box::pin(futures::stream::unfold(
            Some(self.clone()),
            |reader| async move {
                let reader = reader?;
                match reader.read().await {
                    Ok(ReadResult {
                        value: Some(chunk), ..
                    }) => Some((Ok(chunk), Some(reader))),
                    Ok(_) => None,
                    Err(e) => Some((Err(e), None)),
                }
            },
        ))
    }
}

/// Runs a source's hooks: `start`, then `pull` while the loop stays armed,
/// then `cancel` if the consumer asks for it.
///
/// A cancel request interrupts whichever hook is suspended. A panicking hook
/// errors the reader with [`Error::Task`].
async fn drive_source<T, S>(
    mut source: S,
    controller: ReaderController<T>,
    mut cancel: oneshot::Receiver<CancelRequest>,
) where
    T: Send + 'static,
    S: ReaderSource<T>,
{
    let hooks = AssertUnwindSafe(run_hooks(&mut source, &controller)).catch_unwind();
    let interrupted = tokio::select! {
        outcome = hooks => {
            if let Err(panic) = outcome {
                let reason = Error::panicked(panic);
                warn!(error = %reason, "reader source hook panicked");
                controller.error(reason);
            }
            None
        }
        request = &mut cancel => Some(request),
    };

    // Resolves with an error once the reader is dropped without a cancel.
    let request = match interrupted {
        Some(request) => request,
        None => cancel.await,
    };
    if let Ok(done) = request {
        if let Err(e) = source.cancel().await {
            warn!(error = %e, "reader source cancel hook failed");
        }
        let _ = done.send(());
    }
}

async fn run_hooks<T, S>(source: &mut S, controller: &ReaderController<T>)
where
    T: Send + 'static,
    S: ReaderSource<T>,
{
    if let Err(e) = source.start(controller).await {
        controller.error(e);
        return;
    }
    while controller.is_pulling() {
        match source.pull(controller).await {
            Ok(ControlFlow::Continue(())) => tokio::task::yield_now().await,
            Ok(ControlFlow::Break(())) => break,
            Err(e) => {
                controller.error(e);
                break;
            }
        }
    }
}
