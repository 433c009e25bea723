//! The cluster control-plane seam.
//!
//! [`ClusterAdmin`] is the narrow interface the benchmark needs from the
//! cluster; [`CephCli`] implements it by shelling out to the `ceph`, `rados`
//! and `rbd` binaries. Controllers only ever hold `Arc<dyn ClusterAdmin>`,
//! which keeps all of them testable against mocks.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use cephbench_common::BenchResult;
use serde::Deserialize;

use crate::command::{capture_stdout, run_checked, run_to_file};
use crate::health::HealthCondition;
use crate::topology::OsdTree;

/// Parsed reply of `ceph status -f json`, reduced to the overall health flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterStatus {
    pub overall: String,
}

impl ClusterStatus {
    /// True iff the cluster reports `HEALTH_OK`.
    pub fn is_ok(&self) -> bool {
        self.overall == "HEALTH_OK"
    }
}

#[derive(Deserialize)]
struct StatusReply {
    health: StatusHealth,
}

#[derive(Deserialize)]
struct StatusHealth {
    status: String,
}

#[derive(Deserialize)]
struct HealthDetailReply {
    #[serde(default)]
    checks: serde_json::Map<String, serde_json::Value>,
}

/// Control-plane operations the benchmark is built on.
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    /// Coarse health classification (`ceph status`).
    async fn status(&self, timeout: Duration) -> BenchResult<ClusterStatus>;

    /// Active health condition codes (`ceph health detail`).
    async fn conditions(&self, timeout: Duration) -> BenchResult<HashSet<HealthCondition>>;

    /// Full OSD tree (`ceph osd tree`).
    async fn osd_tree(&self, timeout: Duration) -> BenchResult<OsdTree>;

    /// Set the CRUSH weight of one OSD. Errors are fatal for the caller.
    async fn reweight(&self, osd_id: u32, weight: f64) -> BenchResult<()>;

    /// Capture a full cluster report (`ceph report`) into `dest`.
    async fn capture_report(&self, dest: &Path, timeout: Duration) -> BenchResult<()>;

    /// Capture per-pool usage stats (`rados df`) into `dest`.
    async fn capture_pool_stats(&self, dest: &Path, timeout: Duration) -> BenchResult<()>;

    /// Raw `rbd info` text for a volume.
    async fn rbd_info(&self, pool: &str, image: &str, timeout: Duration) -> BenchResult<String>;

    /// Capture `rbd du` for a volume into `dest`.
    async fn capture_rbd_usage(
        &self,
        pool: &str,
        image: &str,
        dest: &Path,
        timeout: Duration,
    ) -> BenchResult<()>;
}

/// Binary names for the CLI-backed implementation.
#[derive(Debug, Clone)]
pub struct CephCliConfig {
    pub ceph_bin: String,
    pub rados_bin: String,
    pub rbd_bin: String,
    /// Timeout for the `reweight` mutation.
    pub reweight_timeout: Duration,
}

impl Default for CephCliConfig {
    fn default() -> Self {
        Self {
            ceph_bin: "ceph".to_string(),
            rados_bin: "rados".to_string(),
            rbd_bin: "rbd".to_string(),
            reweight_timeout: Duration::from_secs(30),
        }
    }
}

/// `ClusterAdmin` implemented over the stock Ceph command-line tools.
pub struct CephCli {
    config: CephCliConfig,
}

impl CephCli {
    pub fn new(config: CephCliConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ClusterAdmin for CephCli {
    async fn status(&self, timeout: Duration) -> BenchResult<ClusterStatus> {
        let raw = capture_stdout(&self.config.ceph_bin, &["status", "-f", "json"], timeout).await?;
        let reply: StatusReply = serde_json::from_slice(&raw)?;
        Ok(ClusterStatus {
            overall: reply.health.status,
        })
    }

    async fn conditions(&self, timeout: Duration) -> BenchResult<HashSet<HealthCondition>> {
        let raw = capture_stdout(
            &self.config.ceph_bin,
            &["health", "detail", "-f", "json"],
            timeout,
        )
        .await?;
        let reply: HealthDetailReply = serde_json::from_slice(&raw)?;
        Ok(reply
            .checks
            .keys()
            .map(|code| HealthCondition::from_code(code))
            .collect())
    }

    async fn osd_tree(&self, timeout: Duration) -> BenchResult<OsdTree> {
        let raw =
            capture_stdout(&self.config.ceph_bin, &["osd", "tree", "-f", "json"], timeout).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn reweight(&self, osd_id: u32, weight: f64) -> BenchResult<()> {
        let target = format!("osd.{osd_id}");
        let weight = format!("{weight}");
        run_checked(
            &self.config.ceph_bin,
            &["osd", "crush", "reweight", &target, &weight],
            Some(self.config.reweight_timeout),
        )
        .await
    }

    async fn capture_report(&self, dest: &Path, timeout: Duration) -> BenchResult<()> {
        run_to_file(&self.config.ceph_bin, &["report"], dest, timeout).await
    }

    async fn capture_pool_stats(&self, dest: &Path, timeout: Duration) -> BenchResult<()> {
        run_to_file(
            &self.config.rados_bin,
            &["df", "-f", "json-pretty"],
            dest,
            timeout,
        )
        .await
    }

    async fn rbd_info(&self, pool: &str, image: &str, timeout: Duration) -> BenchResult<String> {
        let spec = format!("{pool}/{image}");
        let raw = capture_stdout(&self.config.rbd_bin, &["info", &spec], timeout).await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    async fn capture_rbd_usage(
        &self,
        pool: &str,
        image: &str,
        dest: &Path,
        timeout: Duration,
    ) -> BenchResult<()> {
        let spec = format!("{pool}/{image}");
        run_to_file(&self.config.rbd_bin, &["du", &spec], dest, timeout).await
    }
}
