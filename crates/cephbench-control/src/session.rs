//! Run session: output directory preparation and initial volume captures.
//!
//! Everything here is precondition work that must fail before any cluster
//! load or mutation starts: an existing output directory without `--wipe`,
//! or a benchmark volume whose size cannot be determined, aborts the run
//! with a configuration error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cephbench_cluster::{rbd, ClusterAdmin};
use cephbench_common::{BenchError, BenchResult};
use chrono::Local;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Output directory; may contain `{DATETIME}`. None picks a temp dir.
    pub output_dir: Option<String>,
    /// Remove an existing output directory instead of refusing to run.
    pub wipe: bool,
    /// Free-form run comment, stored alongside the artifacts.
    pub comment: String,
    /// Budget for the initial `rbd info` / `rbd du` captures.
    pub capture_timeout: Duration,
}

/// A prepared run: its directory exists, is empty, and carries the comment
/// file; the benchmark volume has been sized.
pub struct RunSession {
    output_dir: PathBuf,
    volume_size: u64,
}

impl RunSession {
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn volume_size(&self) -> u64 {
        self.volume_size
    }

    /// Prepare the output directory, write the comment, and size the volume.
    pub async fn prepare(
        admin: &Arc<dyn ClusterAdmin>,
        opts: &SessionOptions,
        pool: &str,
        image: &str,
    ) -> BenchResult<RunSession> {
        let output_dir = prepare_output_dir(opts.output_dir.as_deref(), opts.wipe)?;
        info!("run artifacts will be stored in '{}'", output_dir.display());
        std::fs::write(output_dir.join("comment"), &opts.comment)?;

        let info_text = admin.rbd_info(pool, image, opts.capture_timeout).await?;
        let volume_size = rbd::parse_volume_size(&info_text).map_err(|e| {
            BenchError::configuration(format!("cannot size volume {pool}/{image}: {e}"))
        })?;
        std::fs::write(output_dir.join("rbd_info"), &info_text)?;

        if let Err(e) = admin
            .capture_rbd_usage(pool, image, &output_dir.join("rbd_du"), opts.capture_timeout)
            .await
        {
            warn!("rbd du capture failed: {e}");
        }

        Ok(RunSession {
            output_dir,
            volume_size,
        })
    }
}

/// Resolve, validate, and create the run output directory.
pub fn prepare_output_dir(spec: Option<&str>, wipe: bool) -> BenchResult<PathBuf> {
    let name = match spec {
        Some(name) => name.replace(
            "{DATETIME}",
            &Local::now().format("%Y-%m-%d_%H:%M:%S").to_string(),
        ),
        None => {
            return Ok(tempfile::Builder::new()
                .prefix("cephbench-")
                .tempdir()?
                .into_path())
        }
    };

    let output_dir = PathBuf::from(name);
    if output_dir.exists() {
        if !wipe {
            return Err(BenchError::configuration(format!(
                "output dir {} already exists; add --wipe to clear it",
                output_dir.display()
            )));
        }
        std::fs::remove_dir_all(&output_dir)?;
    }
    std::fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_dir_without_wipe_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("run");
        std::fs::create_dir(&target).unwrap();

        let err = prepare_output_dir(Some(target.to_str().unwrap()), false).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_wipe_clears_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("run");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("stale"), b"old").unwrap();

        let prepared = prepare_output_dir(Some(target.to_str().unwrap()), true).unwrap();
        assert!(prepared.exists());
        assert!(!prepared.join("stale").exists());
    }

    #[test]
    fn test_datetime_placeholder_is_substituted() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().join("run_{DATETIME}");
        let prepared = prepare_output_dir(Some(spec.to_str().unwrap()), false).unwrap();

        let name = prepared.file_name().unwrap().to_string_lossy().into_owned();
        assert!(!name.contains("{DATETIME}"));
        assert!(name.starts_with("run_"));
        assert!(prepared.exists());
    }

    #[test]
    fn test_unset_output_dir_uses_temp_dir() {
        let prepared = prepare_output_dir(None, false).unwrap();
        assert!(prepared.exists());
        std::fs::remove_dir_all(prepared).unwrap();
    }
}
