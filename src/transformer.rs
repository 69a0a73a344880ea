//! Transformers: a writer whose chunks reappear on a paired reader.
//!
//! The writer side hands every chunk to [`TransformerSource::transform`]
//! together with the controller of the reader side. The reader's bounded
//! buffer is the transform stage's only buffer, so a slow downstream
//! consumer stalls `enqueue`, which stalls the writer, which stalls
//! whatever feeds the transformer.

use async_trait::async_trait;
use tracing::debug;

use crate::core::{ReaderSource, TransformerSource, WriterSink};
use crate::error::{Error, Result};
use crate::reader::{Reader, ReaderConfig, ReaderController};
use crate::writer::{Writer, WriterController};

/// Source of the transformer's reader; all output arrives via the controller.
struct Idle;

#[async_trait]
impl<T: Send + 'static> ReaderSource<T> for Idle {}

/// Routes writer hooks into the user's transform logic.
struct TransformSink<I, O, S>
where
    I: Send + 'static,
    O: Send + 'static,
{
    source: S,
    controller: ReaderController<O>,
    _input: std::marker::PhantomData<fn(I)>,
}

#[async_trait]
impl<I, O, S> WriterSink<I> for TransformSink<I, O, S>
where
    I: Send + 'static,
    O: Send + 'static,
    S: TransformerSource<I, O>,
{
    async fn write(&mut self, chunk: I, _controller: &WriterController) -> Result<()> {
        let result = self.source.transform(chunk, &self.controller).await;
        if let Err(e) = &result {
            // A closed output only means downstream went away.
            if !e.is_closed() {
                self.controller.error(e.clone());
            }
        }
        result
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.source.flush(&self.controller).await {
            self.controller.error(e.clone());
            return Err(e);
        }
        debug!("transformer flushed");
        self.controller.close();
        Ok(())
    }

    async fn abort(&mut self, reason: &Error) -> Result<()> {
        self.controller.error(reason.clone());
        Ok(())
    }
}

/// A writer/reader pair joined by user transform logic.
pub struct Transformer<I: Send + 'static, O: Send + 'static> {
    reader: Reader<O>,
    writer: Writer<I>,
}

impl<I: Send + 'static, O: Send + 'static> Transformer<I, O> {
    /// Create a transformer whose output buffer has the default capacity
    pub fn new<S: TransformerSource<I, O>>(source: S) -> Self {
        Self::with_config(source, ReaderConfig::default())
    }

    /// Create a transformer whose output buffer holds `capacity` chunks
    pub fn with_capacity<S: TransformerSource<I, O>>(source: S, capacity: usize) -> Self {
        Self::with_config(source, ReaderConfig::new().capacity(capacity))
    }

    /// Create a transformer from a reader config
    pub fn with_config<S: TransformerSource<I, O>>(source: S, config: ReaderConfig) -> Self {
        let reader = Reader::with_config(Idle, config);
        let writer = Writer::new(TransformSink {
            source,
            controller: reader.controller(),
            _input: std::marker::PhantomData,
        });
        Self { reader, writer }
    }

    /// The output side
    pub fn reader(&self) -> &Reader<O> {
        &self.reader
    }

    /// The input side
    pub fn writer(&self) -> &Writer<I> {
        &self.writer
    }

    /// Split into the output and input sides
    pub fn into_parts(self) -> (Reader<O>, Writer<I>) {
        (self.reader, self.writer)
    }
}
