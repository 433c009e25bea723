use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use cephbench_cluster::{CephCli, CephCliConfig, ClusterAdmin, HealthOracle, OracleConfig};
use cephbench_common::{BenchError, BenchResult};
use cephbench_control::{
    PhasedBenchmark, PhasedBenchmarkConfig, RebalanceConfig, RebalanceExperiment, RunSession,
    SessionOptions,
};
use cephbench_telemetry::{ClusterStatsSink, SamplerConfig};
use cephbench_workload::{template, FioCli, PhaseRunner, PhaseRunnerConfig, PhaseSpec};

/// Storage-cluster benchmark driver: fio load phases and rebalance timing.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// fio binary to invoke
    #[arg(short, long, default_value = "fio")]
    fio: String,

    /// Clear an existing output directory before the run
    #[arg(short, long)]
    wipe: bool,

    /// Output directory; may contain {DATETIME}. Defaults to a temp dir
    #[arg(short, long)]
    output_dir: Option<String>,

    /// RBD volume in pool/image format
    #[arg(short = 'R', long)]
    rbd_volume_name: String,

    /// Background snapshot period in seconds
    #[arg(short, long, default_value_t = 5)]
    monitoring_period: u64,

    /// Allow operating on pools without 'test' in their name
    #[arg(long = "unsafe")]
    unsafe_pool: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run ordered fio load phases until the latency ceiling trips
    FioTest {
        /// Completion-latency percentile to evaluate
        #[arg(short, long, default_value_t = 90.0)]
        perc: f64,

        /// Latency ceiling in milliseconds; the first phase above it stops
        /// the sequence
        #[arg(short, long, default_value_t = 20.0)]
        lat_limit: f64,

        /// Queue depths, one phase each, in increasing order
        #[arg(short, long, num_args = 1.., default_values_t = vec![25u32, 50, 60, 80, 100, 125, 150, 175, 200])]
        qd: Vec<u32>,

        /// Free-form run comment
        comment: String,

        /// fio config template with {QD}/{POOL}/{RBD}/{SIZE}/{BWLOGFILE}
        cfg: PathBuf,
    },

    /// Time rebalance rounds while generating load during recovery
    Rebalance {
        /// OSD ids to evacuate and restore
        #[arg(long, num_args = 1.., required = true)]
        osd: Vec<u32>,

        /// Queue depth for the per-tick load bursts
        #[arg(short, long, default_value_t = 1)]
        qd: u32,

        /// Evacuate/restore repetitions
        #[arg(short, long, default_value_t = 5)]
        count: u32,

        /// Load burst spacing in seconds during the completion barrier
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// Free-form run comment
        comment: String,

        /// fio config template with {QD}/{POOL}/{RBD}/{SIZE}
        cfg: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    initialize_logging(args.debug)?;

    // Dropping the benchmark future on interrupt releases the background
    // sampler through its drop guard before the process exits.
    let outcome = tokio::select! {
        res = run(args) => res,
        _ = tokio::signal::ctrl_c() => {
            Err(BenchError::command_failed("cephbench", "interrupted"))
        }
    };

    match outcome {
        Ok(()) => {
            info!("done");
            Ok(())
        }
        Err(e) if e.is_configuration() => {
            error!("{e}");
            std::process::exit(1);
        }
        Err(e) => {
            error!("run failed: {e}");
            Err(e.into())
        }
    }
}

async fn run(args: Args) -> BenchResult<()> {
    let (pool, image) = args
        .rbd_volume_name
        .split_once('/')
        .ok_or_else(|| {
            BenchError::configuration("RBD volume must be given as pool/image")
        })?;
    if !args.unsafe_pool && !pool.contains("test") {
        return Err(BenchError::configuration(format!(
            "refusing to work on non-test pool '{pool}'; use a pool with 'test' in its name or add --unsafe"
        )));
    }

    let admin: Arc<dyn ClusterAdmin> = Arc::new(CephCli::new(CephCliConfig::default()));
    let comment = match &args.command {
        Command::FioTest { comment, .. } | Command::Rebalance { comment, .. } => comment.clone(),
    };
    let session = RunSession::prepare(
        &admin,
        &SessionOptions {
            output_dir: args.output_dir.clone(),
            wipe: args.wipe,
            comment,
            capture_timeout: Duration::from_secs(30),
        },
        pool,
        image,
    )
    .await?;

    let mut params = BTreeMap::new();
    params.insert("POOL".to_string(), pool.to_string());
    params.insert("RBD".to_string(), image.to_string());
    params.insert("SIZE".to_string(), session.volume_size().to_string());

    let load = Arc::new(FioCli::new(args.fio.clone()));
    match args.command {
        Command::FioTest {
            perc,
            lat_limit,
            qd,
            cfg,
            ..
        } => {
            let cfg_template = std::fs::read_to_string(&cfg)?;
            let phases: Vec<PhaseSpec> = qd
                .into_iter()
                .map(|queue_depth| PhaseSpec {
                    queue_depth,
                    params: params.clone(),
                })
                .collect();

            let runner = PhaseRunner::new(
                Arc::clone(&admin),
                load,
                PhaseRunnerConfig {
                    percentile: perc,
                    latency_ceiling_ms: lat_limit,
                    ..PhaseRunnerConfig::default()
                },
            );
            let benchmark = PhasedBenchmark::new(
                runner,
                Arc::new(ClusterStatsSink::new(Arc::clone(&admin))),
                PhasedBenchmarkConfig {
                    sampler: SamplerConfig {
                        interval: Duration::from_secs(args.monitoring_period),
                        ..SamplerConfig::default()
                    },
                },
            );

            let report = benchmark
                .run(session.output_dir(), &phases, &cfg_template)
                .await?;
            info!(
                "completed {} phases, {} snapshots captured ({} failed)",
                report.results.len(),
                report.sampler.successes(),
                report.sampler.failures()
            );
            if report.stopped_by_ceiling {
                info!("run stopped early by the latency ceiling");
            }
        }

        Command::Rebalance {
            osd,
            qd,
            count,
            timeout,
            cfg,
            ..
        } => {
            let cfg_template = std::fs::read_to_string(&cfg)?;
            let mut params = params;
            params.insert("QD".to_string(), qd.to_string());
            let rendered = template::render(&cfg_template, &params)?;
            let config_path = session.output_dir().join("cfg.fio");
            std::fs::write(&config_path, rendered)?;

            let oracle = HealthOracle::new(Arc::clone(&admin), OracleConfig::default());
            let experiment = RebalanceExperiment::new(
                Arc::clone(&admin),
                oracle,
                load,
                RebalanceConfig {
                    iterations: count,
                    load_tick: Duration::from_secs(timeout),
                    ..RebalanceConfig::default()
                },
            );

            let iterations = experiment
                .run(session.output_dir(), &osd, &config_path)
                .await?;
            info!("recorded {} rebalance iterations", iterations.len());
        }
    }
    Ok(())
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();

    Ok(())
}
