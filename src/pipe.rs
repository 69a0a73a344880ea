//! Pipe orchestration: connecting readers to writers and transformers.
//!
//! Both pipes read one chunk, write it, and only read the next chunk once
//! that write has settled, so the sink receives chunks in reader order.

use tracing::{debug, warn};

use crate::error::Result;
use crate::reader::Reader;
use crate::transformer::Transformer;
use crate::writer::Writer;

impl<T: Send + 'static> Reader<T> {
    /// Pump every chunk of this reader into `writer`.
    ///
    /// When the reader finishes, `writer` is closed. When the reader errors,
    /// `writer` is aborted with that error and the error is returned. When a
    /// write fails, this reader is closed and the write error is returned.
    pub async fn pipe_to(&self, writer: &Writer<T>) -> Result<()> {
        loop {
            let chunk = match self.read().await {
                Ok(result) => match result.into_value() {
                    Some(chunk) => chunk,
                    None => {
                        debug!("pipe source finished");
                        return writer.close().await;
                    }
                },
                Err(e) => {
                    debug!(error = %e, "pipe source errored");
                    return Err(writer.abort(e).await);
                }
            };

            if let Err(e) = writer.write(chunk).await {
                debug!(error = %e, "pipe destination rejected a chunk");
                self.close().await;
                return Err(e);
            }
        }
    }

    /// Pump this reader into `transformer` and return its output reader.
    ///
    /// The pump runs on its own task with the same ordering and error rules
    /// as [`Reader::pipe_to`], so calls chain:
    /// `reader.pipe_through(a).pipe_through(b).pipe_to(&writer)`.
    /// A reader error aborts the transformer, which errors its output.
    pub fn pipe_through<U: Send + 'static>(&self, transformer: Transformer<T, U>) -> Reader<U> {
        let (output, input) = transformer.into_parts();
        let source = self.clone();
        tokio::spawn(async move {
            if let Err(e) = source.pipe_to(&input).await {
                warn!(error = %e, "pipe through transformer failed");
            }
        });
        output
    }
}
