//! One load phase: config render, before/after snapshots, fio run, stop
//! criterion.
//!
//! The runner performs no retries; each step is a discrete unit the caller
//! may retry by re-running the phase. Snapshot captures around the load run
//! are best-effort and only logged on failure, while a failed fio run or a
//! broken template aborts the phase.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cephbench_common::{clock, BenchResult};
use cephbench_cluster::ClusterAdmin;
use serde::Serialize;
use tracing::{info, warn};

use crate::fio::{self, LoadGenerator};
use crate::template;

/// One entry of the phase sequence. Intensity ordering is by construction of
/// the caller's list; nothing here enforces it.
#[derive(Debug, Clone)]
pub struct PhaseSpec {
    pub queue_depth: u32,
    /// Placeholder bindings shared by the run (`POOL`, `RBD`, `SIZE`, ...).
    pub params: BTreeMap<String, String>,
}

/// Immutable record of one completed phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseResult {
    pub queue_depth: u32,
    pub latency_ms: f64,
    pub started_at: i64,
    pub finished_at: i64,
}

/// How a phase ended: normally, or by tripping the latency ceiling.
///
/// `CeilingExceeded` is the expected clean terminal condition of a phased
/// run, distinct from an error.
#[derive(Debug, Clone)]
pub enum PhaseOutcome {
    Completed(PhaseResult),
    CeilingExceeded(PhaseResult),
}

impl PhaseOutcome {
    pub fn result(&self) -> &PhaseResult {
        match self {
            PhaseOutcome::Completed(r) | PhaseOutcome::CeilingExceeded(r) => r,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhaseRunnerConfig {
    /// Percentile of the completion-latency distribution to extract.
    pub percentile: f64,
    /// Stop the sequence once the extracted latency exceeds this.
    pub latency_ceiling_ms: f64,
    /// Budget for each best-effort before/after report capture.
    pub snapshot_timeout: Duration,
    /// Optional hard limit on one fio run; None leaves it to the config.
    pub load_timeout: Option<Duration>,
}

impl Default for PhaseRunnerConfig {
    fn default() -> Self {
        Self {
            percentile: 90.0,
            latency_ceiling_ms: 20.0,
            snapshot_timeout: Duration::from_secs(30),
            load_timeout: None,
        }
    }
}

/// Executes a single load phase inside its own run directory.
pub struct PhaseRunner {
    admin: Arc<dyn ClusterAdmin>,
    load: Arc<dyn LoadGenerator>,
    config: PhaseRunnerConfig,
}

impl PhaseRunner {
    pub fn new(
        admin: Arc<dyn ClusterAdmin>,
        load: Arc<dyn LoadGenerator>,
        config: PhaseRunnerConfig,
    ) -> Self {
        Self {
            admin,
            load,
            config,
        }
    }

    pub fn config(&self) -> &PhaseRunnerConfig {
        &self.config
    }

    /// Run one phase in `run_dir` (which must already exist and be empty).
    pub async fn run_phase(
        &self,
        run_dir: &Path,
        spec: &PhaseSpec,
        cfg_template: &str,
    ) -> BenchResult<PhaseOutcome> {
        let mut params = spec.params.clone();
        params.insert("QD".to_string(), spec.queue_depth.to_string());
        params.insert(
            "BWLOGFILE".to_string(),
            run_dir.join("log").display().to_string(),
        );
        let rendered = template::render(cfg_template, &params)?;

        let config_path = run_dir.join("cfg.fio");
        std::fs::write(&config_path, rendered)?;
        let output_path = run_dir.join("fio_output.json");

        let started_at = clock::epoch_secs();
        if let Err(e) = self
            .admin
            .capture_report(&run_dir.join("before.json"), self.config.snapshot_timeout)
            .await
        {
            warn!("before-phase cluster snapshot failed: {e}");
        }

        self.load
            .run(&config_path, &output_path, self.config.load_timeout)
            .await?;

        if let Err(e) = self
            .admin
            .capture_report(&run_dir.join("after.json"), self.config.snapshot_timeout)
            .await
        {
            warn!("after-phase cluster snapshot failed: {e}");
        }
        let finished_at = clock::epoch_secs();

        std::fs::write(
            run_dir.join("interval.json"),
            serde_json::to_vec(&[started_at, finished_at])?,
        )?;

        let raw = std::fs::read(&output_path)?;
        let latency_ms = fio::max_completion_latency_ms(&raw, self.config.percentile)?;

        let result = PhaseResult {
            queue_depth: spec.queue_depth,
            latency_ms,
            started_at,
            finished_at,
        };
        if latency_ms > self.config.latency_ceiling_ms {
            info!(
                "latency ceiling exceeded at QD={}: p{} = {:.3}ms (ceiling {}ms)",
                spec.queue_depth, self.config.percentile, latency_ms, self.config.latency_ceiling_ms
            );
            Ok(PhaseOutcome::CeilingExceeded(result))
        } else {
            info!(
                "measured p{} latency for QD={}: {:.3}ms",
                self.config.percentile, spec.queue_depth, latency_ms
            );
            Ok(PhaseOutcome::Completed(result))
        }
    }
}
