//! Mutation batching.

pub mod batcher;

pub use batcher::{BatchField, MutationBatcher};
