//! Greedy-fill batching bounded by byte and cardinality limits.

pub mod batcher;

pub use batcher::{get_batches_for_prefix, Batch, MAX_SOURCE_URIS_PER_LOAD};
