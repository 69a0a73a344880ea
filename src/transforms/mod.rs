//! Transformer sources for the pipestream library.
//!
//! This module provides concrete [`TransformerSource`]s for use with
//! [`Transformer`](crate::transformer::Transformer).

use async_trait::async_trait;
use std::marker::PhantomData;

use crate::core::{Result, TransformerSource};
use crate::reader::ReaderController;

/// A transform that maps chunks using a function.
pub struct MapTransform<F, T, U> {
    f: F,
    _phantom: PhantomData<fn(T) -> U>,
}

impl<F, T, U> MapTransform<F, T, U> {
    /// Create a new map transform
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, U> TransformerSource<T, U> for MapTransform<F, T, U>
where
    F: FnMut(T) -> U + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    async fn transform(&mut self, chunk: T, controller: &ReaderController<U>) -> Result<()> {
        controller.enqueue((self.f)(chunk)).await
    }
}

/// A transform that only passes chunks satisfying a predicate.
pub struct FilterTransform<F, T> {
    predicate: F,
    _phantom: PhantomData<fn(T)>,
}

impl<F, T> FilterTransform<F, T> {
    /// Create a new filter transform
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> TransformerSource<T, T> for FilterTransform<F, T>
where
    F: FnMut(&T) -> bool + Send + 'static,
    T: Send + 'static,
{
    async fn transform(&mut self, chunk: T, controller: &ReaderController<T>) -> Result<()> {
        if (self.predicate)(&chunk) {
            controller.enqueue(chunk).await?;
        }
        Ok(())
    }
}

/// A transform that groups chunks into batches.
///
/// A trailing partial batch is emitted when the input side closes.
pub struct BatchTransform<T> {
    batch_size: usize,
    batch: Vec<T>,
}

impl<T> BatchTransform<T> {
    /// Create a new batch transform
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch: Vec::new(),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> TransformerSource<T, Vec<T>> for BatchTransform<T> {
    async fn transform(&mut self, chunk: T, controller: &ReaderController<Vec<T>>) -> Result<()> {
        self.batch.push(chunk);
        if self.batch.len() >= self.batch_size {
            let batch = std::mem::take(&mut self.batch);
            controller.enqueue(batch).await?;
        }
        Ok(())
    }

    async fn flush(&mut self, controller: &ReaderController<Vec<T>>) -> Result<()> {
        if !self.batch.is_empty() {
            let batch = std::mem::take(&mut self.batch);
            controller.enqueue(batch).await?;
        }
        Ok(())
    }
}

/// A transform that splits batches back into single chunks
pub struct DebatchTransform<T> {
    _phantom: PhantomData<fn(T)>,
}

impl<T> DebatchTransform<T> {
    /// Create a new debatch transform
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for DebatchTransform<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + 'static> TransformerSource<Vec<T>, T> for DebatchTransform<T> {
    async fn transform(&mut self, items: Vec<T>, controller: &ReaderController<T>) -> Result<()> {
        for item in items {
            controller.enqueue(item).await?;
        }
        Ok(())
    }
}
