//! Octree to floorplan: `oct2dq` followed by `floorplan_gen`.

use super::orchestrator::{require_file, Family, FamilyReport, Orchestrator};
use super::output_dir::prepare_output_dir;
use super::scan_filter::laser_scans;
use crate::dataset::{normalize_path, Dataset};
use crate::error::{PipelineError, Step, StepResult};
use crate::hardware::SensorCatalog;
use crate::settings::Oct2dqSettings;
use crate::stage::{Invocation, StageRunner};
use std::path::{Path, PathBuf};

/// Filtered scan files that already exist for the dataset's lasers.
///
/// Fails when none are available, since `oct2dq` needs at least one.
pub(crate) fn available_fss_files(
    step: Step,
    dataset: &Dataset,
    catalog: &SensorCatalog,
) -> StepResult<Vec<PathBuf>> {
    let mut fssfiles = Vec::new();
    for scan in laser_scans(step, dataset, catalog)? {
        if scan.fssfile.is_file() {
            fssfiles.push(scan.fssfile);
        } else {
            tracing::warn!(
                "Laser {} has no filtered scans at {}",
                scan.name,
                scan.fssfile.display()
            );
        }
    }
    if fssfiles.is_empty() {
        return Err(PipelineError::precondition(
            step,
            "unable to determine fss files to use: no filtered scan files available",
        ));
    }
    Ok(fssfiles)
}

impl<R: StageRunner> Orchestrator<R> {
    /// Extract the dq surface from the carved octree, then vectorize it into
    /// a floorplan. `madfile` is the dataset's path file.
    ///
    /// `floorplan_gen` is never launched if `oct2dq` fails.
    pub fn octree_to_floorplan(
        &self,
        dataset_dir: &Path,
        madfile: &Path,
    ) -> StepResult<FamilyReport> {
        let step = Step::OctreeToDq;
        let dataset = self.open_dataset(step, dataset_dir)?;
        let paths = dataset.paths();

        let settings = Oct2dqSettings::load(&self.toolchain.oct2dq_settings).map_err(|e| {
            PipelineError::configuration(step, format!("invalid settings file: {e}"))
        })?;
        let catalog = self.load_catalog(step, &dataset)?;

        let config_xml = paths.hardware_config_xml();
        let fssfiles = available_fss_files(step, &dataset, &catalog)?;
        let pathfile = paths.noisypath_file();
        let octfile = paths.octree();
        let dqfile = paths.carving_dq_file();
        let fpfile = paths.carving_fp_file();
        require_file(step, &pathfile, "noisy path file")?;
        require_file(step, &octfile, "octree")?;

        let madfile = std::path::absolute(madfile).unwrap_or_else(|_| madfile.to_path_buf());
        let madfile = normalize_path(&madfile);
        require_file(Step::FloorplanGeneration, &madfile, "mad file")?;

        prepare_output_dir(step, &paths.carving_fp_dir())?;

        let oct2dq = Invocation::new(&self.toolchain.executables.oct2dq, dataset.root())
            .arg("-c")
            .arg(&config_xml)
            .arg("-s")
            .arg(settings.path())
            .arg(&pathfile)
            .arg(&octfile)
            .arg(&dqfile)
            .args(&fssfiles);
        self.launch(step, &oct2dq)?;

        let floorplan =
            Invocation::new(&self.toolchain.executables.floorplan_gen, dataset.root())
                .arg(&dqfile)
                .arg(&madfile)
                .arg(&fpfile);
        self.launch(Step::FloorplanGeneration, &floorplan)?;

        Ok(FamilyReport {
            family: Family::Floorplan,
            stages_run: 2,
            outputs: vec![dqfile, fpfile],
            skipped: false,
        })
    }
}
