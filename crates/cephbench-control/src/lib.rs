//! # cephbench-control
//!
//! The two benchmark workflows and the surrounding run session:
//! - [`PhasedBenchmark`]: ordered load phases of increasing intensity under a
//!   background telemetry sampler, stopping early on the latency ceiling.
//! - [`RebalanceExperiment`]: alternating topology mutations timed through
//!   cluster-health barriers, with synchronous load bursts while the cluster
//!   rebalances.
//! - [`session`]: run-directory preparation and initial volume captures.

pub mod phased;
pub mod rebalance;
pub mod session;

pub use phased::{BenchReport, PhasedBenchmark, PhasedBenchmarkConfig};
pub use rebalance::{RebalanceConfig, RebalanceExperiment, RebalanceIteration};
pub use session::{RunSession, SessionOptions};
