//! Phased benchmark controller.
//!
//! Drives an ordered sequence of load phases, strictly sequentially (each
//! phase brackets the load with before/after cluster snapshots that would be
//! meaningless under overlap), while the snapshot sampler runs in the
//! background. The sampler is joined on every exit path, normal completion,
//! early stop and fatal error alike, before control returns.

use std::path::Path;
use std::sync::Arc;

use cephbench_common::BenchResult;
use cephbench_telemetry::{SamplerConfig, SamplerStats, SnapshotSampler, SnapshotSink};
use cephbench_workload::{PhaseOutcome, PhaseResult, PhaseRunner, PhaseSpec};
use tracing::{error, info};

#[derive(Debug, Clone, Default)]
pub struct PhasedBenchmarkConfig {
    pub sampler: SamplerConfig,
}

/// Outcome of a full phased run.
#[derive(Debug)]
pub struct BenchReport {
    pub results: Vec<PhaseResult>,
    /// True when the run ended because a phase tripped the latency ceiling
    /// (a clean stop, not an error).
    pub stopped_by_ceiling: bool,
    /// What the background sampler observed over the run.
    pub sampler: SamplerStats,
}

pub struct PhasedBenchmark {
    runner: PhaseRunner,
    sink: Arc<dyn SnapshotSink>,
    config: PhasedBenchmarkConfig,
}

impl PhasedBenchmark {
    pub fn new(
        runner: PhaseRunner,
        sink: Arc<dyn SnapshotSink>,
        config: PhasedBenchmarkConfig,
    ) -> Self {
        Self {
            runner,
            sink,
            config,
        }
    }

    /// Run all phases in caller order under the background sampler.
    pub async fn run(
        &self,
        output_dir: &Path,
        phases: &[PhaseSpec],
        cfg_template: &str,
    ) -> BenchResult<BenchReport> {
        let mut sampler = SnapshotSampler::new(
            self.config.sampler.clone(),
            Arc::clone(&self.sink),
            output_dir.join("monitoring"),
        );
        sampler.start()?;

        // Hold the drive result across the join so the sampler is released
        // on the error path too.
        let driven = self.drive(output_dir, phases, cfg_template).await;
        let stats = sampler.stop().await;

        let (results, stopped_by_ceiling) = driven?;
        let sampler_stats = stats?;
        Ok(BenchReport {
            results,
            stopped_by_ceiling,
            sampler: sampler_stats,
        })
    }

    async fn drive(
        &self,
        output_dir: &Path,
        phases: &[PhaseSpec],
        cfg_template: &str,
    ) -> BenchResult<(Vec<PhaseResult>, bool)> {
        let mut results = Vec::with_capacity(phases.len());
        for spec in phases {
            let run_dir = output_dir.join(spec.queue_depth.to_string());
            std::fs::create_dir(&run_dir)?;
            info!("starting phase with QD={}", spec.queue_depth);

            match self.runner.run_phase(&run_dir, spec, cfg_template).await {
                Ok(PhaseOutcome::Completed(result)) => results.push(result),
                Ok(PhaseOutcome::CeilingExceeded(result)) => {
                    results.push(result);
                    return Ok((results, true));
                }
                Err(e) => {
                    error!("phase QD={} failed: {e}", spec.queue_depth);
                    return Err(e);
                }
            }
        }
        Ok((results, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cephbench_common::{BenchError, BenchResult};
    use cephbench_cluster::{ClusterAdmin, ClusterStatus, HealthCondition, OsdTree};
    use cephbench_workload::{LoadGenerator, PhaseRunnerConfig, PhaseSpec};
    use std::collections::{BTreeMap, HashSet};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    struct NullAdmin;

    #[async_trait]
    impl ClusterAdmin for NullAdmin {
        async fn status(&self, _t: Duration) -> BenchResult<ClusterStatus> {
            unimplemented!("not used in this test")
        }

        async fn conditions(&self, _t: Duration) -> BenchResult<HashSet<HealthCondition>> {
            unimplemented!("not used in this test")
        }

        async fn osd_tree(&self, _t: Duration) -> BenchResult<OsdTree> {
            unimplemented!("not used in this test")
        }

        async fn reweight(&self, _osd_id: u32, _weight: f64) -> BenchResult<()> {
            unimplemented!("not used in this test")
        }

        async fn capture_report(&self, dest: &Path, _t: Duration) -> BenchResult<()> {
            std::fs::write(dest, b"{}")?;
            Ok(())
        }

        async fn capture_pool_stats(&self, dest: &Path, _t: Duration) -> BenchResult<()> {
            std::fs::write(dest, b"{}")?;
            Ok(())
        }

        async fn rbd_info(&self, _p: &str, _i: &str, _t: Duration) -> BenchResult<String> {
            unimplemented!("not used in this test")
        }

        async fn capture_rbd_usage(
            &self,
            _p: &str,
            _i: &str,
            _d: &Path,
            _t: Duration,
        ) -> BenchResult<()> {
            unimplemented!("not used in this test")
        }
    }

    /// Load generator replaying a scripted latency per invocation.
    struct ScriptedLoad {
        latencies_ms: Mutex<Vec<f64>>,
        invocations: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedLoad {
        fn new(latencies_ms: &[f64]) -> Self {
            let mut script: Vec<f64> = latencies_ms.to_vec();
            script.reverse(); // pop() from the front of the script
            Self {
                latencies_ms: Mutex::new(script),
                invocations: Mutex::new(Vec::new()),
            }
        }

        fn invocation_count(&self) -> usize {
            self.invocations.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LoadGenerator for ScriptedLoad {
        async fn run(
            &self,
            _config: &Path,
            output: &Path,
            _timeout: Option<Duration>,
        ) -> BenchResult<()> {
            let latency_ms = self
                .latencies_ms
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BenchError::command_failed("fio", "script exhausted"))?;
            self.invocations.lock().unwrap().push(output.to_path_buf());
            let body = serde_json::json!({
                "jobs": [{"jobname": "rbd", "mixed": {"clat_ns": {"percentile": {
                    "90.000000": latency_ms * 1_000_000.0
                }}}}]
            });
            std::fs::write(output, serde_json::to_vec(&body)?)?;
            Ok(())
        }
    }

    struct NoopSink;

    #[async_trait]
    impl cephbench_telemetry::SnapshotSink for NoopSink {
        async fn capture(&self, _dest: &Path, _timeout: Duration) -> BenchResult<()> {
            Ok(())
        }
    }

    fn specs(queue_depths: &[u32]) -> Vec<PhaseSpec> {
        let params: BTreeMap<String, String> = [("POOL", "testpool"), ("RBD", "bench"), ("SIZE", "1073741824")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        queue_depths
            .iter()
            .map(|&qd| PhaseSpec {
                queue_depth: qd,
                params: params.clone(),
            })
            .collect()
    }

    const TEMPLATE: &str = "iodepth={QD}\npool={POOL}\nrbdname={RBD}\nsize={SIZE}\nlog={BWLOGFILE}\n";

    fn benchmark(load: Arc<ScriptedLoad>) -> PhasedBenchmark {
        let runner = PhaseRunner::new(
            Arc::new(NullAdmin),
            load,
            PhaseRunnerConfig {
                latency_ceiling_ms: 20.0,
                ..PhaseRunnerConfig::default()
            },
        );
        PhasedBenchmark::new(runner, Arc::new(NoopSink), PhasedBenchmarkConfig::default())
    }

    #[tokio::test]
    async fn test_ceiling_stops_sequence_cleanly() {
        // Three phases at QD 25/50/100 measuring 10, 15 and 25ms against a
        // 20ms ceiling: all three produce results, the run reports a clean
        // stop and no fourth invocation happens.
        let dir = tempfile::tempdir().unwrap();
        let load = Arc::new(ScriptedLoad::new(&[10.0, 15.0, 25.0, 99.0]));
        let report = benchmark(Arc::clone(&load))
            .run(dir.path(), &specs(&[25, 50, 100]), TEMPLATE)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 3);
        assert!(report.stopped_by_ceiling);
        assert_eq!(load.invocation_count(), 3);
        assert_eq!(report.results[2].latency_ms, 25.0);
        assert_eq!(
            report.results.iter().map(|r| r.queue_depth).collect::<Vec<_>>(),
            vec![25, 50, 100]
        );
    }

    #[tokio::test]
    async fn test_all_phases_below_ceiling_run_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let load = Arc::new(ScriptedLoad::new(&[5.0, 8.0, 12.0]));
        let report = benchmark(Arc::clone(&load))
            .run(dir.path(), &specs(&[25, 50, 100]), TEMPLATE)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 3);
        assert!(!report.stopped_by_ceiling);
        assert_eq!(load.invocation_count(), 3);
    }

    #[tokio::test]
    async fn test_fatal_phase_error_still_stops_sampler() {
        let dir = tempfile::tempdir().unwrap();
        // Script exhausted on the second phase: the drive fails, but run()
        // must still join the sampler and surface the phase error.
        let load = Arc::new(ScriptedLoad::new(&[5.0]));
        let err = benchmark(Arc::clone(&load))
            .run(dir.path(), &specs(&[25, 50]), TEMPLATE)
            .await
            .unwrap_err();

        assert!(matches!(err, BenchError::CommandFailed { .. }));
        assert_eq!(load.invocation_count(), 1);
    }

    #[tokio::test]
    async fn test_each_phase_gets_its_own_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let load = Arc::new(ScriptedLoad::new(&[5.0, 8.0]));
        benchmark(Arc::clone(&load))
            .run(dir.path(), &specs(&[25, 50]), TEMPLATE)
            .await
            .unwrap();

        for qd in [25, 50] {
            let phase_dir = dir.path().join(qd.to_string());
            assert!(phase_dir.join("cfg.fio").exists());
            assert!(phase_dir.join("fio_output.json").exists());
            assert!(phase_dir.join("interval.json").exists());
        }
        assert!(dir.path().join("monitoring").is_dir());
    }
}
