//! Core traits and types for the pipestream library.
//!
//! This module contains the capability traits that plug user code into
//! readers, writers and transformers, together with the error types.

pub mod traits;

// Re-export core items
pub use crate::error::{Error, Result};
pub use traits::{ReaderSource, TransformerSource, WriterSink};
