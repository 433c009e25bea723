//! Cluster health oracle.
//!
//! Two signals drive the benchmark's barriers, and they are deliberately
//! distinct: a cluster can carry warnings (not [`ClusterHealth::Healthy`])
//! while no data movement is happening, and recovery activity is the stricter
//! signal the rebalance barriers actually wait on.
//!
//! The oracle is conservative on ambiguity. Timing measurements taken while
//! recovery is still running would be garbage, so an unreachable or slow
//! control plane reads as "not healthy" / "still recovering" and the caller
//! keeps waiting.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::admin::ClusterAdmin;

/// Coarse health classification, derived per call and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterHealth {
    /// Cluster reports `HEALTH_OK`.
    Healthy,
    /// Cluster answered but reports warnings or errors.
    Degraded,
    /// The status query timed out or failed; treated as not healthy.
    Unknown,
}

impl ClusterHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ClusterHealth::Healthy)
    }
}

impl fmt::Display for ClusterHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterHealth::Healthy => write!(f, "healthy"),
            ClusterHealth::Degraded => write!(f, "degraded"),
            ClusterHealth::Unknown => write!(f, "unknown"),
        }
    }
}

/// Named health condition codes from `ceph health detail`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthCondition {
    /// Data redundancy degraded; present while recovery/backfill runs.
    PgDegraded,
    /// Some data unavailable.
    PgAvailability,
    /// Any other check code, kept verbatim.
    Other(String),
}

impl HealthCondition {
    pub fn from_code(code: &str) -> Self {
        match code {
            "PG_DEGRADED" => HealthCondition::PgDegraded,
            "PG_AVAILABILITY" => HealthCondition::PgAvailability,
            other => HealthCondition::Other(other.to_string()),
        }
    }

    pub fn as_code(&self) -> &str {
        match self {
            HealthCondition::PgDegraded => "PG_DEGRADED",
            HealthCondition::PgAvailability => "PG_AVAILABILITY",
            HealthCondition::Other(code) => code,
        }
    }
}

/// Query timeouts for the oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub status_timeout: Duration,
    pub conditions_timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            status_timeout: Duration::from_secs(10),
            conditions_timeout: Duration::from_secs(5),
        }
    }
}

/// Stateless request/response wrapper over [`ClusterAdmin`] health queries.
pub struct HealthOracle {
    admin: Arc<dyn ClusterAdmin>,
    config: OracleConfig,
}

impl HealthOracle {
    pub fn new(admin: Arc<dyn ClusterAdmin>, config: OracleConfig) -> Self {
        Self { admin, config }
    }

    /// Bounded-time health query. Never returns an error: a timeout or a
    /// malformed reply classifies as [`ClusterHealth::Unknown`] so barrier
    /// loops keep polling instead of busy-failing.
    pub async fn health(&self) -> ClusterHealth {
        match self.admin.status(self.config.status_timeout).await {
            Ok(status) if status.is_ok() => ClusterHealth::Healthy,
            Ok(status) => {
                debug!("cluster health is {}", status.overall);
                ClusterHealth::Degraded
            }
            Err(e) => {
                debug!("health query failed, classifying as unknown: {e}");
                ClusterHealth::Unknown
            }
        }
    }

    /// True iff data redundancy is currently degraded (recovery running).
    ///
    /// On query timeout or any failure this returns true: the completion
    /// barrier must keep waiting rather than declare the rebalance finished
    /// on ambiguous state.
    pub async fn has_active_recovery(&self) -> bool {
        match self.admin.conditions(self.config.conditions_timeout).await {
            Ok(conditions) => conditions.contains(&HealthCondition::PgDegraded),
            Err(e) => {
                warn!("health detail query failed, assuming recovery is active: {e}");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::ClusterStatus;
    use crate::topology::OsdTree;
    use async_trait::async_trait;
    use cephbench_common::{BenchError, BenchResult};
    use std::collections::HashSet;
    use std::path::Path;

    /// Mock admin with scripted health replies.
    struct MockAdmin {
        status: BenchResult<ClusterStatus>,
        conditions: BenchResult<HashSet<HealthCondition>>,
    }

    impl MockAdmin {
        fn with_status(overall: &str) -> Self {
            Self {
                status: Ok(ClusterStatus {
                    overall: overall.to_string(),
                }),
                conditions: Ok(HashSet::new()),
            }
        }

        fn with_conditions(codes: &[&str]) -> Self {
            Self {
                status: Ok(ClusterStatus {
                    overall: "HEALTH_WARN".to_string(),
                }),
                conditions: Ok(codes.iter().map(|c| HealthCondition::from_code(c)).collect()),
            }
        }

        fn failing() -> Self {
            Self {
                status: Err(BenchError::timeout("ceph status", Duration::from_secs(10))),
                conditions: Err(BenchError::timeout(
                    "ceph health detail",
                    Duration::from_secs(5),
                )),
            }
        }
    }

    fn clone_result<T: Clone>(r: &BenchResult<T>) -> BenchResult<T> {
        match r {
            Ok(v) => Ok(v.clone()),
            Err(BenchError::Timeout { command, timeout }) => Err(BenchError::Timeout {
                command: command.clone(),
                timeout: *timeout,
            }),
            Err(e) => Err(BenchError::command_failed("mock", e.to_string())),
        }
    }

    #[async_trait]
    impl ClusterAdmin for MockAdmin {
        async fn status(&self, _timeout: Duration) -> BenchResult<ClusterStatus> {
            clone_result(&self.status)
        }

        async fn conditions(&self, _timeout: Duration) -> BenchResult<HashSet<HealthCondition>> {
            clone_result(&self.conditions)
        }

        async fn osd_tree(&self, _timeout: Duration) -> BenchResult<OsdTree> {
            unimplemented!("not used by the oracle")
        }

        async fn reweight(&self, _osd_id: u32, _weight: f64) -> BenchResult<()> {
            unimplemented!("not used by the oracle")
        }

        async fn capture_report(&self, _dest: &Path, _timeout: Duration) -> BenchResult<()> {
            unimplemented!("not used by the oracle")
        }

        async fn capture_pool_stats(&self, _dest: &Path, _timeout: Duration) -> BenchResult<()> {
            unimplemented!("not used by the oracle")
        }

        async fn rbd_info(
            &self,
            _pool: &str,
            _image: &str,
            _timeout: Duration,
        ) -> BenchResult<String> {
            unimplemented!("not used by the oracle")
        }

        async fn capture_rbd_usage(
            &self,
            _pool: &str,
            _image: &str,
            _dest: &Path,
            _timeout: Duration,
        ) -> BenchResult<()> {
            unimplemented!("not used by the oracle")
        }
    }

    fn oracle(admin: MockAdmin) -> HealthOracle {
        HealthOracle::new(Arc::new(admin), OracleConfig::default())
    }

    #[tokio::test]
    async fn test_health_classification() {
        assert_eq!(
            oracle(MockAdmin::with_status("HEALTH_OK")).health().await,
            ClusterHealth::Healthy
        );
        assert_eq!(
            oracle(MockAdmin::with_status("HEALTH_WARN")).health().await,
            ClusterHealth::Degraded
        );
        assert_eq!(
            oracle(MockAdmin::failing()).health().await,
            ClusterHealth::Unknown
        );
        assert!(!ClusterHealth::Unknown.is_healthy());
    }

    #[tokio::test]
    async fn test_recovery_detection() {
        assert!(
            oracle(MockAdmin::with_conditions(&["PG_DEGRADED", "OSDMAP_FLAGS"]))
                .has_active_recovery()
                .await
        );
        assert!(
            !oracle(MockAdmin::with_conditions(&["OSDMAP_FLAGS"]))
                .has_active_recovery()
                .await
        );
        assert!(!oracle(MockAdmin::with_conditions(&[])).has_active_recovery().await);
    }

    #[tokio::test]
    async fn test_recovery_is_conservative_on_timeout() {
        // A timed out condition query must never read as "recovery done".
        assert!(oracle(MockAdmin::failing()).has_active_recovery().await);
    }

    #[test]
    fn test_condition_codes_round_trip() {
        for code in ["PG_DEGRADED", "PG_AVAILABILITY", "OSDMAP_FLAGS"] {
            assert_eq!(HealthCondition::from_code(code).as_code(), code);
        }
    }
}
