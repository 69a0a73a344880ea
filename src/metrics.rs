//! Counters for chunk traffic, recorded through the `metrics` facade.
//!
//! Install any `metrics` recorder to collect them.

use metrics::counter;

pub const CHUNKS_ENQUEUED: &str = "pipestream_chunks_enqueued_total";
pub const CHUNKS_READ: &str = "pipestream_chunks_read_total";
pub const CHUNKS_WRITTEN: &str = "pipestream_chunks_written_total";
pub const WRITE_FAILURES: &str = "pipestream_write_failures_total";
pub const READERS_ERRORED: &str = "pipestream_readers_errored_total";
pub const WRITERS_ABORTED: &str = "pipestream_writers_aborted_total";

pub(crate) fn chunk_enqueued() {
    counter!(CHUNKS_ENQUEUED).increment(1);
}

pub(crate) fn chunk_read() {
    counter!(CHUNKS_READ).increment(1);
}

pub(crate) fn chunk_written(ok: bool) {
    if ok {
        counter!(CHUNKS_WRITTEN).increment(1);
    } else {
        counter!(WRITE_FAILURES).increment(1);
    }
}

pub(crate) fn reader_errored() {
    counter!(READERS_ERRORED).increment(1);
}

pub(crate) fn writer_aborted() {
    counter!(WRITERS_ABORTED).increment(1);
}
