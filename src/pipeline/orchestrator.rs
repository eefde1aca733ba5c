//! Pipeline orchestrator.
//!
//! Each pipeline family follows the same protocol: resolve and check inputs,
//! prepare a clean output location, launch the native stage, and stop the
//! whole run on the first failure. Nothing is launched until every check for
//! that family has passed.

use crate::config::{Config, Toolchain};
use crate::dataset::Dataset;
use crate::error::{PipelineError, Step, StepResult};
use crate::hardware::{CatalogOptions, SensorCatalog};
use crate::pipeline::Metrics;
use crate::stage::{Invocation, StageRunner, StageStatus};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// A named group of stages run by one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    ScanFiltering,
    Chunking,
    Floorplan,
    DepthMaps,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Family::ScanFiltering => "scan filtering",
            Family::Chunking => "chunk generation",
            Family::Floorplan => "octree to floorplan",
            Family::DepthMaps => "depth maps",
        })
    }
}

/// Outcome of a family that finished without error.
#[derive(Debug, Clone, Serialize)]
pub struct FamilyReport {
    pub family: Family,
    /// Native stage processes launched
    pub stages_run: usize,
    /// Artifacts the stages were asked to produce
    pub outputs: Vec<PathBuf>,
    /// True when there was nothing to process (e.g. no sensors of the type)
    pub skipped: bool,
}

impl FamilyReport {
    pub(crate) fn skipped(family: Family) -> Self {
        Self {
            family,
            stages_run: 0,
            outputs: Vec::new(),
            skipped: true,
        }
    }
}

/// Runs pipeline families against datasets.
pub struct Orchestrator<R> {
    pub(crate) config: Config,
    pub(crate) toolchain: Toolchain,
    runner: R,
    metrics: Arc<Metrics>,
}

impl<R: StageRunner> Orchestrator<R> {
    pub fn new(config: Config, toolchain: Toolchain, runner: R) -> Self {
        Self {
            config,
            toolchain,
            runner,
            metrics: Metrics::new(),
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run every family in order: scan filtering, chunk generation,
    /// octree to floorplan, depth maps. Stops at the first failure.
    pub fn run_all(&self, dataset_dir: &Path, madfile: &Path) -> StepResult<Vec<FamilyReport>> {
        let reports = vec![
            self.filter_scans(dataset_dir)?,
            self.generate_chunks(dataset_dir)?,
            self.octree_to_floorplan(dataset_dir, madfile)?,
            self.generate_depth_maps(dataset_dir)?,
        ];
        tracing::info!("All pipeline families completed for {}", dataset_dir.display());
        Ok(reports)
    }

    pub(crate) fn open_dataset(&self, step: Step, dataset_dir: &Path) -> StepResult<Dataset> {
        let dataset = Dataset::open(dataset_dir).map_err(|e| {
            PipelineError::precondition(
                step,
                format!("dataset {} is not usable: {e}", dataset_dir.display()),
            )
        })?;
        tracing::debug!("Dataset root: {}", dataset.root().display());
        Ok(dataset)
    }

    /// Parse the dataset's hardware configuration, expanding per-sensor
    /// config files relative to the dataset root.
    pub(crate) fn load_catalog(&self, step: Step, dataset: &Dataset) -> StepResult<SensorCatalog> {
        let options = CatalogOptions {
            expand_config_files: true,
            base_dir: Some(dataset.root().to_path_buf()),
        };
        let path = dataset.paths().hardware_config_xml();
        let catalog = SensorCatalog::load(&path, &options)
            .map_err(|e| PipelineError::configuration(step, e.to_string()))?;
        tracing::debug!(
            "Hardware config {} declares {} active sensors",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Launch a stage and return how it ended. Only a failure to start the
    /// process is an error here.
    pub(crate) fn execute(&self, step: Step, invocation: &Invocation) -> StepResult<StageStatus> {
        tracing::info!("[{}] Running {}", step, invocation.program_name());
        tracing::debug!("[{}] {} (cwd {})", step, invocation, invocation.working_dir().display());

        let started = Instant::now();
        let status = self.runner.run(invocation).map_err(|source| {
            self.metrics.add_launch_error();
            PipelineError::StageLaunch {
                step,
                executable: invocation.executable().to_path_buf(),
                source,
            }
        })?;
        let elapsed = started.elapsed();
        self.metrics.add_stage_run(elapsed, status.success());

        if status.success() {
            tracing::info!(
                "[{}] {} finished in {:.1}s",
                step,
                invocation.program_name(),
                elapsed.as_secs_f64()
            );
        } else {
            tracing::error!("[{}] {} returned {}", step, invocation.program_name(), status);
        }
        Ok(status)
    }

    /// Launch a stage that must succeed.
    pub(crate) fn launch(&self, step: Step, invocation: &Invocation) -> StepResult<()> {
        let started = Instant::now();
        let status = self.execute(step, invocation)?;
        if !status.success() {
            return Err(PipelineError::StageExecution {
                step,
                executable: invocation.program_name(),
                exit_code: status.code(),
                detail: None,
            });
        }
        self.metrics.add_step_completed(step, started.elapsed());
        Ok(())
    }

    pub(crate) fn skip(&self, family: Family, reason: &str) -> FamilyReport {
        tracing::info!("Skipping {}: {}", family, reason);
        self.metrics.add_step_skipped();
        FamilyReport::skipped(family)
    }
}

/// Require an input artifact to exist as a regular file.
pub(crate) fn require_file(step: Step, path: &Path, what: &str) -> StepResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::precondition(
            step,
            format!("{} not found at {}", what, path.display()),
        ))
    }
}
