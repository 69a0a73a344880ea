//! Utility functions for building readers, writers and transformers from
//! plain iterators and closures.

use std::future::Future;

use crate::error::Result;
use crate::reader::Reader;
use crate::sinks::FnSink;
use crate::sources::{FnSource, IterSource};
use crate::transformer::Transformer;
use crate::transforms::{FilterTransform, MapTransform};
use crate::writer::Writer;

/// Helper function to create a reader over the items of an iterator
pub fn from_iter<C>(items: C) -> Reader<C::Item>
where
    C: IntoIterator,
    C::IntoIter: Send + 'static,
    C::Item: Send + 'static,
{
    Reader::new(IterSource::new(items))
}

/// Helper function to create a reader pulling from an async closure
pub fn from_fn<F, Fut, T>(f: F) -> Reader<T>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<T>>> + Send + 'static,
    T: Send + 'static,
{
    Reader::new(FnSource::new(f))
}

/// Helper function to create a writer from an async closure
pub fn writer_from_fn<F, Fut, T>(f: F) -> Writer<T>
where
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
    T: Send + 'static,
{
    Writer::new(FnSink::new(f))
}

/// Helper function to create a transformer that maps every chunk
pub fn map<F, T, U>(f: F) -> Transformer<T, U>
where
    F: FnMut(T) -> U + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    Transformer::new(MapTransform::new(f))
}

/// Helper function to create a transformer that drops chunks failing `predicate`
pub fn filter<F, T>(predicate: F) -> Transformer<T, T>
where
    F: FnMut(&T) -> bool + Send + 'static,
    T: Send + 'static,
{
    Transformer::new(FilterTransform::new(predicate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_closure_pipeline() {
        let total = Arc::new(AtomicI32::new(0));
        let sum = total.clone();
        let writer = writer_from_fn(move |x: i32| {
            sum.fetch_add(x, Ordering::SeqCst);
            async { Ok(()) }
        });

        from_iter(1..=4)
            .pipe_through(map(|x: i32| x * 10))
            .pipe_through(filter(|x: &i32| *x > 10))
            .pipe_to(&writer)
            .await
            .unwrap();

        assert_eq!(total.load(Ordering::SeqCst), 90);
    }
}
