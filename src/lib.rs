//! # Backpressured Reader/Writer/Transformer streams for Rust
//!
//! This crate provides a small, composable streaming core: pull sources,
//! push sinks and transformers connected through bounded buffers, with
//! cooperative cancellation and sticky error propagation.
//!
//! ## Core Concepts
//!
//! - **Reader**: pulls chunks from a source into a bounded buffer and hands
//!   them out through `read`
//! - **Writer**: serializes writes into a sink, one chunk at a time
//! - **Transformer**: a writer whose chunks reappear, transformed, on a
//!   paired reader
//! - **Pipe**: `pipe_to` and `pipe_through` connect the three, propagating
//!   completion and errors
//!
//! ## Example
//!
//! ```rust
//! use pipestream::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let sink = CollectSink::new();
//!     let writer = Writer::new(sink.clone());
//!
//!     Reader::new(IterSource::new(1..=3))
//!         .pipe_through(Transformer::new(MapTransform::new(|x: i32| x * 2)))
//!         .pipe_to(&writer)
//!         .await?;
//!
//!     assert_eq!(sink.items().await, vec![2, 4, 6]);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod core;
pub mod error;
mod pipe;
pub mod reader;
pub mod sinks;
pub mod sources;
pub mod transformer;
pub mod transforms;
pub mod util;
pub mod writer;

// Re-export commonly used items
pub mod prelude {
    pub use crate::core::{ReaderSource, TransformerSource, WriterSink};
    pub use crate::error::{Error, Result};
    pub use crate::reader::{ReadResult, Reader, ReaderConfig, ReaderController};
    pub use crate::sinks::*;
    pub use crate::sources::*;
    pub use crate::transformer::Transformer;
    pub use crate::transforms::*;
    pub use crate::writer::{Writer, WriterController};
}

// Re-export main error type
pub use error::{Error, Result};

// Feature flags for optional dependencies
#[cfg(feature = "metrics")]
pub mod metrics;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
