//! Integration tests for readers, writers, transformers and pipes

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipestream::prelude::*;
use tokio::sync::Notify;
use tokio_stream::StreamExt;

/// A source that enqueues a fixed list from `start`, then optionally fails.
struct Scripted {
    items: Vec<i32>,
    then_fail: Option<&'static str>,
}

#[async_trait]
impl ReaderSource<i32> for Scripted {
    async fn start(&mut self, controller: &ReaderController<i32>) -> Result<()> {
        for item in self.items.drain(..) {
            controller.enqueue(item).await?;
        }
        match self.then_fail {
            Some(reason) => controller.error(reason),
            None => controller.close(),
        }
        Ok(())
    }
}

fn scripted(items: Vec<i32>) -> Reader<i32> {
    Reader::new(Scripted {
        items,
        then_fail: None,
    })
}

struct Wrap;

#[async_trait]
impl TransformerSource<String, String> for Wrap {
    async fn transform(&mut self, chunk: String, controller: &ReaderController<String>) -> Result<()> {
        controller.enqueue(format!("({})", chunk)).await
    }
}

#[tokio::test]
async fn test_enqueue_three_then_close() {
    let reader = scripted(vec![1, 2, 3]);

    let mut results = Vec::new();
    for _ in 0..4 {
        let result = reader.read().await.unwrap();
        results.push((result.done, result.value));
    }
    assert_eq!(
        results,
        vec![
            (false, Some(1)),
            (false, Some(2)),
            (false, Some(3)),
            (true, None)
        ]
    );
    assert!(reader.read().await.unwrap().done);
}

#[tokio::test]
async fn test_wrap_through_two_transformers() {
    let sink = CollectSink::new();
    let writer = Writer::new(sink.clone());

    scripted(vec![1, 2, 3])
        .pipe_through(Transformer::new(MapTransform::new(|x: i32| x.to_string())))
        .pipe_through(Transformer::new(Wrap))
        .pipe_through(Transformer::new(Wrap))
        .pipe_to(&writer)
        .await
        .unwrap();

    assert_eq!(sink.items().await, vec!["((1))", "((2))", "((3))"]);
    assert!(sink.is_closed());
}

/// Enqueues one chunk, waits until the sink has written it, then fails.
struct FailAfterDelivery {
    written: Arc<Notify>,
}

#[async_trait]
impl ReaderSource<i32> for FailAfterDelivery {
    async fn start(&mut self, controller: &ReaderController<i32>) -> Result<()> {
        controller.enqueue(1).await?;
        self.written.notified().await;
        controller.error("source exploded");
        Ok(())
    }
}

/// A `CollectSink` that signals every completed write.
struct Signalling {
    inner: CollectSink<i32>,
    written: Arc<Notify>,
}

#[async_trait]
impl WriterSink<i32> for Signalling {
    async fn write(&mut self, chunk: i32, controller: &WriterController) -> Result<()> {
        self.inner.write(chunk, controller).await?;
        self.written.notify_one();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }

    async fn abort(&mut self, reason: &Error) -> Result<()> {
        self.inner.abort(reason).await
    }
}

#[tokio::test]
async fn test_pipe_to_with_failing_reader() {
    let written = Arc::new(Notify::new());
    let reader = Reader::new(FailAfterDelivery {
        written: written.clone(),
    });
    let sink = CollectSink::new();
    let writer = Writer::new(Signalling {
        inner: sink.clone(),
        written,
    });

    let err = reader.pipe_to(&writer).await.unwrap_err();
    assert_eq!(err.to_string(), "source exploded");
    assert_eq!(sink.items().await, vec![1]);
    assert_eq!(sink.abort_reason().unwrap().to_string(), "source exploded");
    assert!(!sink.is_closed());
}

#[tokio::test]
async fn test_error_after_enqueue_discards_chunk() {
    let reader = Reader::new(Scripted {
        items: vec![42],
        then_fail: Some("boom"),
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(reader.read().await.unwrap_err().to_string(), "boom");
    assert_eq!(reader.read().await.unwrap_err().to_string(), "boom");
}

#[tokio::test]
async fn test_pipe_through_error_reaches_the_end() {
    let reader = Reader::new(Scripted {
        items: vec![],
        then_fail: Some("early failure"),
    });
    let sink = CollectSink::new();
    let writer = Writer::new(sink.clone());

    let err = reader
        .pipe_through(Transformer::new(MapTransform::new(|x: i32| x + 1)))
        .pipe_through(Transformer::new(MapTransform::new(|x: i32| x * 2)))
        .pipe_to(&writer)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "early failure");
    assert_eq!(sink.abort_reason().unwrap().to_string(), "early failure");
}

#[tokio::test]
async fn test_reader_stream_iteration() {
    let reader = scripted(vec![5, 6, 7]);
    let items: Vec<i32> = reader.stream().collect::<Result<_>>().await.unwrap();
    assert_eq!(items, vec![5, 6, 7]);

    // A finished reader yields an empty stream.
    assert_eq!(reader.stream().collect::<Vec<_>>().await.len(), 0);
}

#[tokio::test]
async fn test_breaking_out_of_stream_keeps_reader_open() {
    let reader = scripted(vec![1, 2, 3]);
    let mut stream = reader.stream();
    assert_eq!(stream.next().await.unwrap().unwrap(), 1);
    drop(stream);

    assert_eq!(reader.read().await.unwrap().into_value(), Some(2));
    assert_eq!(reader.read().await.unwrap().into_value(), Some(3));
    assert!(reader.read().await.unwrap().done);
}

#[tokio::test]
async fn test_stream_yields_error_once() {
    let reader = Reader::new(Scripted {
        items: vec![],
        then_fail: Some("bad"),
    });
    let items: Vec<Result<i32>> = reader.stream().collect().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap_err().to_string(), "bad");
}

/// Tracks how far ahead of the consumer the producer runs.
struct Eager {
    produced: Arc<AtomicUsize>,
}

#[async_trait]
impl ReaderSource<usize> for Eager {
    async fn pull(&mut self, controller: &ReaderController<usize>) -> Result<ControlFlow<()>> {
        let n = self.produced.load(Ordering::SeqCst);
        controller.enqueue(n).await?;
        self.produced.fetch_add(1, Ordering::SeqCst);
        Ok(ControlFlow::Continue(()))
    }
}

#[tokio::test]
async fn test_backpressure_bounds_production() {
    let produced = Arc::new(AtomicUsize::new(0));
    let reader = Reader::with_capacity(
        Eager {
            produced: produced.clone(),
        },
        8,
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(produced.load(Ordering::SeqCst), 8);

    for expected in 0..4 {
        assert_eq!(reader.read().await.unwrap().into_value(), Some(expected));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(produced.load(Ordering::SeqCst), 12);

    reader.close().await;
    assert!(reader.read().await.unwrap().done);
}

#[tokio::test]
async fn test_slow_writer_stalls_pipeline() {
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let writer = pipestream::util::writer_from_fn(move |_: i32| {
        let counter = counter.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    let reader = Reader::with_capacity(IterSource::new(0..40), 2)
        .pipe_through(Transformer::with_capacity(MapTransform::new(|x: i32| x), 2));
    reader.pipe_to(&writer).await.unwrap();

    assert_eq!(delivered.load(Ordering::SeqCst), 40);
}

#[tokio::test]
async fn test_concurrent_readers_share_one_sequence() {
    let reader = Reader::with_capacity(IterSource::new(0..100), 4);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let reader = reader.clone();
        handles.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(chunk) = reader.read().await.unwrap().into_value() {
                seen.push(chunk);
            }
            seen
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        let seen = handle.await.unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        all.extend(seen);
    }
    all.sort();
    assert_eq!(all, (0..100).collect::<Vec<_>>());
}
