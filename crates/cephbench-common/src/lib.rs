//! # cephbench-common
//!
//! Shared building blocks for the cephbench workspace:
//! - The `BenchError`/`BenchResult` error types used across all crates
//! - `ArtifactGuard`, a scoped write-or-discard guard for capture files
//! - Epoch timestamp helpers

pub mod artifact;
pub mod clock;
pub mod errors;

pub use artifact::ArtifactGuard;
pub use errors::{BenchError, BenchResult};
