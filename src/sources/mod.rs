//! Source implementations for the pipestream library.
//!
//! This module provides ready-made [`ReaderSource`]s that feed a
//! [`Reader`](crate::reader::Reader) from iterators, repeated values and
//! async closures.

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::ops::ControlFlow;
use tracing::debug;

use crate::core::{ReaderSource, Result};
use crate::reader::ReaderController;

/// A source that yields the items of an iterator, one per pull.
///
/// The reader is closed once the iterator is exhausted, unless
/// [`keep_open`](IterSource::keep_open) was requested.
pub struct IterSource<I> {
    iter: I,
    keep_open: bool,
}

impl<I: Iterator> IterSource<I> {
    /// Create a new iterator source
    pub fn new<C: IntoIterator<IntoIter = I>>(items: C) -> Self {
        Self {
            iter: items.into_iter(),
            keep_open: false,
        }
    }

    /// Leave the reader open after the last item.
    pub fn keep_open(mut self) -> Self {
        self.keep_open = true;
        self
    }
}

#[async_trait]
impl<I> ReaderSource<I::Item> for IterSource<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    async fn pull(&mut self, controller: &ReaderController<I::Item>) -> Result<ControlFlow<()>> {
        match self.iter.next() {
            Some(item) => {
                controller.enqueue(item).await?;
                Ok(ControlFlow::Continue(()))
            }
            None => {
                if !self.keep_open {
                    controller.close();
                }
                Ok(ControlFlow::Break(()))
            }
        }
    }
}

/// A source that repeats a single value
pub struct RepeatSource<T> {
    value: T,
    remaining: Option<usize>,
}

impl<T: Clone> RepeatSource<T> {
    /// Create a source that repeats a value until the reader is closed
    pub fn new(value: T) -> Self {
        Self {
            value,
            remaining: None,
        }
    }

    /// Create a source that repeats a value n times, then closes
    pub fn times(value: T, count: usize) -> Self {
        Self {
            value,
            remaining: Some(count),
        }
    }
}

#[async_trait]
impl<T: Clone + Send + 'static> ReaderSource<T> for RepeatSource<T> {
    async fn pull(&mut self, controller: &ReaderController<T>) -> Result<ControlFlow<()>> {
        if let Some(ref mut rem) = self.remaining {
            if *rem == 0 {
                controller.close();
                return Ok(ControlFlow::Break(()));
            }
            *rem -= 1;
        }
        controller.enqueue(self.value.clone()).await?;
        Ok(ControlFlow::Continue(()))
    }

    async fn cancel(&mut self) -> Result<()> {
        debug!("repeat source cancelled");
        Ok(())
    }
}

/// A source driven by an async closure.
///
/// `Some(item)` is enqueued, `None` closes the reader, and an error puts the
/// reader into the errored state.
pub struct FnSource<F, Fut, T> {
    f: F,
    _phantom: PhantomData<(Fut, T)>,
}

impl<F, Fut, T> FnSource<F, Fut, T>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<T>>> + Send + 'static,
    T: Send + 'static,
{
    /// Create a new closure source
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T> ReaderSource<T> for FnSource<F, Fut, T>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<T>>> + Send + 'static,
    T: Send + 'static,
{
    async fn pull(&mut self, controller: &ReaderController<T>) -> Result<ControlFlow<()>> {
        match (self.f)().await? {
            Some(item) => {
                controller.enqueue(item).await?;
                Ok(ControlFlow::Continue(()))
            }
            None => {
                controller.close();
                Ok(ControlFlow::Break(()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_iter_source() {
        let reader = Reader::new(IterSource::new(vec!["a", "b", "c"]));
        let items: Vec<_> = reader.stream().collect::<Result<_>>().await.unwrap();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_repeat_source_times() {
        let reader = Reader::with_capacity(RepeatSource::times("hello", 3), 1);
        let items: Vec<_> = reader.stream().collect::<Result<_>>().await.unwrap();
        assert_eq!(items, vec!["hello", "hello", "hello"]);
    }

    #[tokio::test]
    async fn test_repeat_source_until_closed() {
        let reader = Reader::with_capacity(RepeatSource::new(7u8), 2);
        let first: Vec<_> = reader.stream().take(5).collect::<Result<_>>().await.unwrap();
        assert_eq!(first, vec![7; 5]);

        reader.close().await;
        assert!(reader.read().await.unwrap().done);
    }

    #[tokio::test]
    async fn test_fn_source() {
        let mut n = 0;
        let reader = Reader::new(FnSource::new(move || {
            n += 1;
            async move { Ok(if n <= 4 { Some(n * n) } else { None }) }
        }));
        let items: Vec<i32> = reader.stream().collect::<Result<_>>().await.unwrap();
        assert_eq!(items, vec![1, 4, 9, 16]);
    }
}
