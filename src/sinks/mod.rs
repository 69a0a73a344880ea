//! Sink implementations for the pipestream library.
//!
//! This module provides ready-made [`WriterSink`]s that consume chunks
//! arriving through a [`Writer`](crate::writer::Writer).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::debug;

use crate::core::{Error, Result, WriterSink};
use crate::writer::WriterController;

/// A sink that collects chunks into a vector.
///
/// Clones share the collected chunks, so a clone kept by the caller can
/// inspect what the writer delivered.
pub struct CollectSink<T> {
    items: Arc<TokioMutex<Vec<T>>>,
    closed: Arc<AtomicBool>,
    aborted: Arc<Mutex<Option<Error>>>,
}

impl<T: Send + 'static> CollectSink<T> {
    /// Create a new collect sink
    pub fn new() -> Self {
        Self {
            items: Arc::new(TokioMutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            aborted: Arc::new(Mutex::new(None)),
        }
    }

    /// Get a copy of the collected chunks
    pub async fn items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.lock().await.clone()
    }

    /// Whether the writer was closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The reason the writer was aborted with, if it was
    pub fn abort_reason(&self) -> Option<Error> {
        self.aborted.lock().clone()
    }
}

#[async_trait]
impl<T: Send + 'static> WriterSink<T> for CollectSink<T> {
    async fn write(&mut self, chunk: T, _controller: &WriterController) -> Result<()> {
        self.items.lock().await.push(chunk);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn abort(&mut self, reason: &Error) -> Result<()> {
        debug!(reason = %reason, "collect sink aborted");
        *self.aborted.lock() = Some(reason.clone());
        Ok(())
    }
}

impl<T: Send + 'static> Default for CollectSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CollectSink<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            closed: self.closed.clone(),
            aborted: self.aborted.clone(),
        }
    }
}

/// A sink that counts chunks
pub struct CountSink<T> {
    count: Arc<AtomicUsize>,
    _phantom: PhantomData<fn(T)>,
}

impl<T> CountSink<T> {
    /// Create a new count sink
    pub fn new() -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            _phantom: PhantomData,
        }
    }

    /// Get the current count
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Send + 'static> WriterSink<T> for CountSink<T> {
    async fn write(&mut self, _chunk: T, _controller: &WriterController) -> Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl<T> Default for CountSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CountSink<T> {
    fn clone(&self) -> Self {
        Self {
            count: self.count.clone(),
            _phantom: PhantomData,
        }
    }
}

/// A sink that hands every chunk to an async closure
pub struct FnSink<F, Fut, T> {
    f: F,
    _phantom: PhantomData<(Fut, fn(T))>,
}

impl<F, Fut, T> FnSink<F, Fut, T>
where
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
    T: Send + 'static,
{
    /// Create a new closure sink
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T> WriterSink<T> for FnSink<F, Fut, T>
where
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
    T: Send + 'static,
{
    async fn write(&mut self, chunk: T, _controller: &WriterController) -> Result<()> {
        (self.f)(chunk).await
    }
}
