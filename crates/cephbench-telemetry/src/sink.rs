//! Snapshot destinations.
//!
//! The sampler writes each tick through a [`SnapshotSink`]; the production
//! sink captures per-pool usage stats from the cluster. Each tick targets a
//! distinct, uniquely-named file, so concurrent single-writer appends need no
//! locking, and a failed capture must leave no partial artifact behind
//! (the cluster capture path guarantees this with its artifact guard).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cephbench_cluster::ClusterAdmin;
use cephbench_common::BenchResult;

/// One snapshot capture into `dest`, bounded by `timeout`.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn capture(&self, dest: &Path, timeout: Duration) -> BenchResult<()>;
}

/// Captures `rados df` pool statistics through the cluster admin seam.
pub struct ClusterStatsSink {
    admin: Arc<dyn ClusterAdmin>,
}

impl ClusterStatsSink {
    pub fn new(admin: Arc<dyn ClusterAdmin>) -> Self {
        Self { admin }
    }
}

#[async_trait]
impl SnapshotSink for ClusterStatsSink {
    async fn capture(&self, dest: &Path, timeout: Duration) -> BenchResult<()> {
        self.admin.capture_pool_stats(dest, timeout).await
    }
}
