//! Background snapshot sampler.
//!
//! Runs on a dedicated tokio task, firing on a fixed period measured from the
//! previous deadline (`next = previous + interval`), so a slow tick costs
//! only its own overrun and never accumulates drift. The only state shared
//! with the foreground is the cancellation signal; `stop()` raises it and
//! then joins the task, letting an in-flight tick finish first. Cancellation
//! is observed within one tick boundary.
//!
//! Lifecycle: `Idle -> Running -> Stopping -> Stopped`. Requesting an
//! operation in the wrong state is an explicit error, not a silent no-op.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cephbench_common::{clock, BenchError, BenchResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::sink::SnapshotSink;

/// Sampler lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for SamplerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerState::Idle => write!(f, "idle"),
            SamplerState::Running => write!(f, "running"),
            SamplerState::Stopping => write!(f, "stopping"),
            SamplerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Sampler cadence and per-tick capture budget.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Fixed firing period.
    pub interval: Duration,
    /// Bounded timeout for each capture; a timeout fails the tick only.
    pub capture_timeout: Duration,
    /// Artifact filename prefix; each tick writes `<prefix>_<epoch_ms>.json`.
    pub file_prefix: String,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            capture_timeout: Duration::from_secs(5),
            file_prefix: "radosdf".to_string(),
        }
    }
}

/// Record of one capture attempt. Failures leave no artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotTick {
    pub timestamp_ms: i64,
    pub succeeded: bool,
}

/// Everything the sampler observed over its lifetime, returned by `stop()`.
#[derive(Debug, Clone, Default)]
pub struct SamplerStats {
    pub ticks: Vec<SnapshotTick>,
}

impl SamplerStats {
    pub fn successes(&self) -> usize {
        self.ticks.iter().filter(|t| t.succeeded).count()
    }

    pub fn failures(&self) -> usize {
        self.ticks.len() - self.successes()
    }
}

/// Periodic telemetry snapshot capture on a dedicated background task.
pub struct SnapshotSampler {
    config: SamplerConfig,
    sink: Arc<dyn SnapshotSink>,
    output_dir: PathBuf,
    state: SamplerState,
    cancel: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<SamplerStats>>,
}

impl SnapshotSampler {
    pub fn new(config: SamplerConfig, sink: Arc<dyn SnapshotSink>, output_dir: PathBuf) -> Self {
        Self {
            config,
            sink,
            output_dir,
            state: SamplerState::Idle,
            cancel: None,
            handle: None,
        }
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    /// Transition `Idle -> Running`: create the output directory and spawn
    /// the tick loop.
    pub fn start(&mut self) -> BenchResult<()> {
        if self.state != SamplerState::Idle {
            return Err(BenchError::invalid_state("idle", self.state.to_string()));
        }
        std::fs::create_dir_all(&self.output_dir)?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = SamplerTask {
            config: self.config.clone(),
            sink: Arc::clone(&self.sink),
            output_dir: self.output_dir.clone(),
        };
        self.handle = Some(tokio::spawn(task.run(cancel_rx)));
        self.cancel = Some(cancel_tx);
        self.state = SamplerState::Running;
        info!(
            "snapshot sampler started (interval {:?}, dir {})",
            self.config.interval,
            self.output_dir.display()
        );
        Ok(())
    }

    /// Transition `Running -> Stopping -> Stopped`: raise the cancellation
    /// signal and join the task. Blocks until an in-flight tick (if any) has
    /// completed.
    pub async fn stop(&mut self) -> BenchResult<SamplerStats> {
        if self.state != SamplerState::Running {
            return Err(BenchError::invalid_state("running", self.state.to_string()));
        }
        self.state = SamplerState::Stopping;
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(true);
        }

        let handle = self
            .handle
            .take()
            .ok_or_else(|| BenchError::invalid_state("running", "no task handle"))?;
        let stats = handle
            .await
            .map_err(|e| BenchError::command_failed("snapshot sampler task", e.to_string()))?;

        self.state = SamplerState::Stopped;
        info!(
            "snapshot sampler stopped after {} ticks ({} failed)",
            stats.ticks.len(),
            stats.failures()
        );
        Ok(stats)
    }
}

impl Drop for SnapshotSampler {
    fn drop(&mut self) {
        // Last resort for cancelled runs that never reached stop(); the
        // normal path joins the task instead of aborting it.
        if let Some(handle) = self.handle.take() {
            handle.abort();
            warn!("snapshot sampler dropped while running, task aborted");
        }
    }
}

struct SamplerTask {
    config: SamplerConfig,
    sink: Arc<dyn SnapshotSink>,
    output_dir: PathBuf,
}

impl SamplerTask {
    async fn run(self, mut cancel: watch::Receiver<bool>) -> SamplerStats {
        let mut stats = SamplerStats::default();
        let mut deadline = Instant::now() + self.config.interval;

        loop {
            tokio::select! {
                biased;
                _ = cancel.changed() => break,
                _ = tokio::time::sleep_until(deadline) => {}
            }
            // Next deadline is computed from the previous deadline once per
            // tick, not from tick completion.
            deadline += self.config.interval;

            let timestamp_ms = clock::epoch_millis();
            let dest = self
                .output_dir
                .join(format!("{}_{}.json", self.config.file_prefix, timestamp_ms));
            let succeeded = match self.sink.capture(&dest, self.config.capture_timeout).await {
                Ok(()) => {
                    debug!("captured snapshot {}", dest.display());
                    true
                }
                Err(e) => {
                    warn!("snapshot capture failed, continuing: {e}");
                    false
                }
            };
            stats.ticks.push(SnapshotTick {
                timestamp_ms,
                succeeded,
            });
        }
        stats
    }
}
