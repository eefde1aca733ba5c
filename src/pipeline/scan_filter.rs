//! Laser scan filtering: one `filter_urg_scans` run per laser.

use super::orchestrator::{require_file, Family, FamilyReport, Orchestrator};
use crate::config::FailurePolicy;
use crate::dataset::{fss_file_for, Dataset};
use crate::error::{PipelineError, Step, StepResult};
use crate::hardware::{SensorCatalog, LASERS, URG_DATAFILE};
use crate::stage::{Invocation, StageRunner};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One laser's raw scan file and the filtered file it produces.
#[derive(Debug, Clone)]
pub(crate) struct LaserScan {
    pub name: String,
    pub datfile: PathBuf,
    pub fssfile: PathBuf,
}

/// Raw and filtered scan files of every active laser, in document order.
pub(crate) fn laser_scans(
    step: Step,
    dataset: &Dataset,
    catalog: &SensorCatalog,
) -> StepResult<Vec<LaserScan>> {
    catalog
        .sensors_of_type(LASERS)
        .iter()
        .map(|urg| {
            let relative = catalog
                .property(urg, URG_DATAFILE, LASERS)
                .map_err(|e| PipelineError::configuration(step, e.to_string()))?;
            let datfile = dataset.paths().resolve(relative);
            let fssfile = fss_file_for(&datfile);
            Ok(LaserScan {
                name: urg.name().to_string(),
                datfile,
                fssfile,
            })
        })
        .collect()
}

impl<R: StageRunner> Orchestrator<R> {
    /// Filter the raw range scans of every laser into `.fss` files beside them.
    ///
    /// With no lasers configured this succeeds without launching anything.
    /// Under [`FailurePolicy::Exhaustive`] a laser whose stage cannot be
    /// launched counts as a failure like a non-zero exit, and the remaining
    /// lasers still run.
    pub fn filter_scans(&self, dataset_dir: &Path) -> StepResult<FamilyReport> {
        let step = Step::ScanFiltering;
        let started = Instant::now();
        let dataset = self.open_dataset(step, dataset_dir)?;
        let catalog = self.load_catalog(step, &dataset)?;

        let scans = laser_scans(step, &dataset, &catalog)?;
        if scans.is_empty() {
            return Ok(self.skip(Family::ScanFiltering, "no lasers configured"));
        }

        let timefile = dataset.paths().timesync_xml();
        require_file(step, &timefile, "time synchronization file")?;
        for scan in &scans {
            require_file(step, &scan.datfile, &format!("raw scan file of laser {}", scan.name))?;
        }

        let policy = self.config.filtering.failure_policy;
        let total = scans.len();
        let mut outputs = Vec::with_capacity(total);
        let mut failures: Vec<(String, PipelineError)> = Vec::new();

        for scan in scans {
            tracing::info!("Filtering scans of laser {}", scan.name);
            let invocation =
                Invocation::new(&self.toolchain.executables.filter_urg_scans, dataset.root())
                    .arg(&scan.datfile)
                    .arg(&scan.fssfile)
                    .arg(&timefile);

            let err = match self.execute(step, &invocation) {
                Ok(status) if status.success() => {
                    outputs.push(scan.fssfile);
                    continue;
                }
                Ok(status) => PipelineError::StageExecution {
                    step,
                    executable: invocation.program_name(),
                    exit_code: status.code(),
                    detail: Some(format!("laser {}", scan.name)),
                },
                Err(launch) => launch,
            };
            match policy {
                FailurePolicy::FailFast => return Err(err),
                FailurePolicy::Exhaustive => {
                    tracing::warn!("Laser {} failed, continuing with remaining lasers", scan.name);
                    failures.push((scan.name, err));
                }
            }
        }

        if !failures.is_empty() {
            let failed = failures.len();
            let names: Vec<&str> = failures.iter().map(|(n, _)| n.as_str()).collect();
            tracing::error!(
                "{} of {} lasers failed filtering: {}",
                failed,
                total,
                names.join(", ")
            );
            let (first, err) = failures.swap_remove(0);
            let detail = format!("laser {first}; {failed} of {total} lasers failed");
            return Err(match err {
                PipelineError::StageExecution {
                    step,
                    executable,
                    exit_code,
                    ..
                } => PipelineError::StageExecution {
                    step,
                    executable,
                    exit_code,
                    detail: Some(detail),
                },
                other => other,
            });
        }

        self.metrics().add_step_completed(step, started.elapsed());
        Ok(FamilyReport {
            family: Family::ScanFiltering,
            stages_run: total,
            outputs,
            skipped: false,
        })
    }
}
