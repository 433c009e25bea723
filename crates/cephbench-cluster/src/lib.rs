//! # cephbench-cluster
//!
//! Everything cephbench needs from the cluster control plane:
//! - bounded-timeout execution of external admin commands
//! - the [`ClusterAdmin`] trait seam and its `ceph`/`rados`/`rbd` CLI
//!   implementation
//! - the health oracle (coarse health classification plus the stricter
//!   "recovery in progress" signal used as a barrier)
//! - OSD tree parsing and CRUSH weight capture
//! - RBD volume info parsing
//!
//! The control plane is treated as opaque: this crate only observes it and
//! issues single-shot mutations, it never implements placement logic.

pub mod admin;
pub mod command;
pub mod health;
pub mod rbd;
pub mod topology;

pub use admin::{CephCli, CephCliConfig, ClusterAdmin, ClusterStatus};
pub use health::{ClusterHealth, HealthCondition, HealthOracle, OracleConfig};
pub use topology::{OsdNode, OsdTree};
