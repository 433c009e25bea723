//! fio invocation and result parsing.
//!
//! fio is run synchronously with `--output-format=json+` writing into the
//! phase directory. The statistic the stop criterion uses is the configured
//! percentile of the mixed-operation completion latency, taken as the
//! maximum over all reported job groups: the ceiling protects against any
//! single degraded shard, not the aggregate.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use cephbench_common::{BenchError, BenchResult};
use serde::Deserialize;

use cephbench_cluster::command::run_checked;

/// clat values are reported in nanoseconds; results are compared in whole
/// milliseconds. The conversion is fixed for comparability with historical
/// data.
const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// One synchronous load-generator run.
#[async_trait]
pub trait LoadGenerator: Send + Sync {
    /// Run the generator with `config`, writing its JSON result to `output`.
    /// `timeout == None` leaves the duration to the config itself.
    async fn run(
        &self,
        config: &Path,
        output: &Path,
        timeout: Option<Duration>,
    ) -> BenchResult<()>;
}

/// `LoadGenerator` backed by the fio binary.
pub struct FioCli {
    binary: String,
}

impl FioCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl LoadGenerator for FioCli {
    async fn run(
        &self,
        config: &Path,
        output: &Path,
        timeout: Option<Duration>,
    ) -> BenchResult<()> {
        let output_arg = format!("--output={}", output.display());
        let config_arg = config.display().to_string();
        run_checked(
            &self.binary,
            &["--output-format=json+", &output_arg, &config_arg],
            timeout,
        )
        .await
    }
}

#[derive(Deserialize)]
struct FioOutput {
    jobs: Vec<FioJob>,
}

#[derive(Deserialize)]
struct FioJob {
    #[serde(default)]
    jobname: Option<String>,
    mixed: Option<OpStats>,
}

#[derive(Deserialize)]
struct OpStats {
    clat_ns: ClatStats,
}

#[derive(Deserialize)]
struct ClatStats {
    percentile: HashMap<String, f64>,
}

/// Extract the worst (maximum over job groups) completion latency at the
/// given percentile, converted from nanoseconds to milliseconds.
pub fn max_completion_latency_ms(raw: &[u8], percentile: f64) -> BenchResult<f64> {
    let output: FioOutput = serde_json::from_slice(raw)?;
    if output.jobs.is_empty() {
        return Err(BenchError::parse("fio output", "no job groups reported"));
    }

    let key = format!("{percentile:.6}");
    let mut max_ns: f64 = 0.0;
    for job in &output.jobs {
        let name = job.jobname.as_deref().unwrap_or("<unnamed>");
        let stats = job.mixed.as_ref().ok_or_else(|| {
            BenchError::parse(
                "fio output",
                format!("job group '{name}' reports no mixed stats"),
            )
        })?;
        let value = stats.clat_ns.percentile.get(&key).ok_or_else(|| {
            BenchError::parse(
                "fio output",
                format!("job group '{name}' has no {key} clat percentile"),
            )
        })?;
        max_ns = max_ns.max(*value);
    }
    Ok(max_ns / NANOS_PER_MILLI)
}
