//! Rebalance timing experiment.
//!
//! Alternates two topology configurations: evacuate (CRUSH weight 0 for
//! every member) and restore (the weight recorded before the first
//! mutation). Each sub-phase is timed through two health barriers: wait for
//! recovery to start, then wait for it to finish while firing one load burst
//! per tick. The barrier loops are unbounded by design; recovery onset is
//! assumed imminent once a mutation is applied, and the run is bounded only
//! by its external watchdog or operator.
//!
//! Timing records are flushed once at the end of the run; a crash mid-run
//! loses the whole record. This is an accepted limitation.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cephbench_common::{clock, BenchResult};
use cephbench_cluster::{ClusterAdmin, HealthOracle};
use cephbench_workload::LoadGenerator;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Four epoch-second timestamps per iteration: when devices were evacuated
/// ("out") and restored ("in"). Within an iteration
/// `start_out <= finish_out <= start_in <= finish_in` by sequencing.
#[derive(Debug, Clone, Serialize)]
pub struct RebalanceIteration {
    pub index: u32,
    pub start_out: i64,
    pub finish_out: i64,
    pub start_in: i64,
    pub finish_in: i64,
}

#[derive(Debug, Clone)]
pub struct RebalanceConfig {
    /// Evacuate/restore repetitions.
    pub iterations: u32,
    /// Spacing of load bursts inside the completion barrier.
    pub load_tick: Duration,
    /// Poll interval of both health barriers.
    pub health_poll: Duration,
    /// Budget for the up-front OSD tree query.
    pub osd_tree_timeout: Duration,
    /// Budget for the initial best-effort cluster report capture.
    pub report_timeout: Duration,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            load_tick: Duration::from_secs(10),
            health_poll: Duration::from_millis(100),
            osd_tree_timeout: Duration::from_secs(10),
            report_timeout: Duration::from_secs(60),
        }
    }
}

enum Direction {
    Evacuate,
    Restore,
}

pub struct RebalanceExperiment {
    admin: Arc<dyn ClusterAdmin>,
    oracle: HealthOracle,
    load: Arc<dyn LoadGenerator>,
    config: RebalanceConfig,
}

impl RebalanceExperiment {
    pub fn new(
        admin: Arc<dyn ClusterAdmin>,
        oracle: HealthOracle,
        load: Arc<dyn LoadGenerator>,
        config: RebalanceConfig,
    ) -> Self {
        Self {
            admin,
            oracle,
            load,
            config,
        }
    }

    /// Run the experiment: `iterations` evacuate/restore rounds over
    /// `osd_ids`, firing `config_path` load bursts while the cluster
    /// rebalances, and flush the timing record to `timings.json`.
    pub async fn run(
        &self,
        output_dir: &Path,
        osd_ids: &[u32],
        config_path: &Path,
    ) -> BenchResult<Vec<RebalanceIteration>> {
        // Original weights are captured once, all-or-abort, before any
        // mutation touches the cluster.
        let tree = self.admin.osd_tree(self.config.osd_tree_timeout).await?;
        let weights = tree.crush_weights_for(osd_ids)?;
        info!("captured original crush weights for {} osds", weights.len());

        let mon_dir = output_dir.join("monitoring");
        std::fs::create_dir_all(&mon_dir)?;
        if let Err(e) = self
            .admin
            .capture_report(&output_dir.join("report.json"), self.config.report_timeout)
            .await
        {
            warn!("initial cluster report capture failed: {e}");
        }

        let mut artifact_idx = 0usize;
        let mut iterations = Vec::with_capacity(self.config.iterations as usize);
        for index in 0..self.config.iterations {
            info!("rebalance iteration {}/{}", index + 1, self.config.iterations);
            let (start_out, finish_out) = self
                .run_direction(Direction::Evacuate, osd_ids, &weights, &mon_dir, config_path, &mut artifact_idx)
                .await?;
            let (start_in, finish_in) = self
                .run_direction(Direction::Restore, osd_ids, &weights, &mon_dir, config_path, &mut artifact_idx)
                .await?;
            iterations.push(RebalanceIteration {
                index,
                start_out,
                finish_out,
                start_in,
                finish_in,
            });
        }

        self.write_timings(output_dir, &iterations)?;
        Ok(iterations)
    }

    async fn run_direction(
        &self,
        direction: Direction,
        osd_ids: &[u32],
        weights: &HashMap<u32, f64>,
        mon_dir: &Path,
        config_path: &Path,
        artifact_idx: &mut usize,
    ) -> BenchResult<(i64, i64)> {
        let started_at = clock::epoch_secs();

        for &osd_id in osd_ids {
            let weight = match direction {
                Direction::Evacuate => 0.0,
                Direction::Restore => weights[&osd_id],
            };
            info!("reweighting osd.{osd_id} to {weight}");
            self.admin.reweight(osd_id, weight).await?;
        }

        debug!("waiting for rebalance to start");
        while self.oracle.health().await.is_healthy() {
            tokio::time::sleep(self.config.health_poll).await;
        }

        debug!("waiting for rebalance to complete");
        let mut next_burst = Instant::now();
        while self.oracle.has_active_recovery().await {
            next_burst += self.config.load_tick;
            let output = mon_dir.join(format!("{artifact_idx}.json"));
            *artifact_idx += 1;
            self.load.run(config_path, &output, None).await?;

            // Sleep out the remainder of the tick; an overrun proceeds
            // immediately.
            let now = Instant::now();
            if next_burst > now {
                tokio::time::sleep(next_burst - now).await;
            }
        }

        Ok((started_at, clock::epoch_secs()))
    }

    fn write_timings(
        &self,
        output_dir: &Path,
        iterations: &[RebalanceIteration],
    ) -> BenchResult<()> {
        #[derive(Serialize)]
        struct Timing {
            start_out: i64,
            finish_out: i64,
            start_in: i64,
            finish_in: i64,
        }

        let timings: BTreeMap<u32, Timing> = iterations
            .iter()
            .map(|it| {
                (
                    it.index,
                    Timing {
                        start_out: it.start_out,
                        finish_out: it.finish_out,
                        start_in: it.start_in,
                        finish_in: it.finish_in,
                    },
                )
            })
            .collect();
        std::fs::write(
            output_dir.join("timings.json"),
            serde_json::to_vec_pretty(&timings)?,
        )?;
        Ok(())
    }
}
