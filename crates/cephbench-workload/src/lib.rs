//! # cephbench-workload
//!
//! One load-generation phase from end to end: render the fio config
//! template, capture before/after cluster snapshots, run fio, and extract
//! the percentile latency statistic the stop criterion is evaluated on.

pub mod fio;
pub mod phase;
pub mod template;

pub use fio::{FioCli, LoadGenerator};
pub use phase::{PhaseOutcome, PhaseResult, PhaseRunner, PhaseRunnerConfig, PhaseSpec};
