//! Storage-agnostic table drain primitives.
//!
//! This crate owns the cursor-paginated record stream, the scoped delete batch,
//! and the drain loop that ties them together. It intentionally excludes AWS SDK
//! and Lambda runtime concerns; those live in `table_drain_lambda`, which plugs a
//! DynamoDB client in through [`backend::TableBackend`].
//!
//! A drain assumes no concurrent writers. Records written while a drain is in
//! flight may or may not be observed depending on where they land relative to
//! the scan cursor.

pub mod backend;
pub mod batch;
pub mod drain;
pub mod error;
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
pub mod record;
pub mod stream;
