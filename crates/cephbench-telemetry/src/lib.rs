//! # cephbench-telemetry
//!
//! The background snapshot sampler: one telemetry artifact per tick on a
//! fixed cadence, independent of the foreground benchmark, with join-on-stop
//! cancellation. Individual tick failures are recorded and skipped; they
//! never abort the sampler or the enclosing run.

pub mod sampler;
pub mod sink;

pub use sampler::{SamplerConfig, SamplerState, SamplerStats, SnapshotSampler, SnapshotTick};
pub use sink::{ClusterStatsSink, SnapshotSink};
