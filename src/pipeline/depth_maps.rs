//! Depth and normal maps: one batched `depth_maps` run over every camera.

use super::orchestrator::{require_file, Family, FamilyReport, Orchestrator};
use super::output_dir::prepare_output_dir;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Step, StepResult};
use crate::hardware::{SensorCatalog, CAMERAS, CAMERA_OUTPUT_DIRECTORY};
use crate::stage::{Invocation, StageRunner};
use std::path::{Path, PathBuf};

const MCD_EXTENSION: &str = "mcd";

/// Inputs and output of one camera in the batch.
#[derive(Debug, Clone)]
struct CameraJob {
    name: String,
    mcdfile: PathBuf,
    posefile: PathBuf,
    outdir: PathBuf,
}

/// The single `.mcd` file in a camera's rectified `level` image directory.
fn find_level_mcd(step: Step, level_dir: &Path) -> StepResult<PathBuf> {
    let mut mcd_files: Vec<PathBuf> = match std::fs::read_dir(level_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == MCD_EXTENSION))
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            return Err(PipelineError::precondition(
                step,
                format!("unable to list {}: {e}", level_dir.display()),
            ))
        }
    };
    mcd_files.sort();

    match mcd_files.len() {
        0 => Err(PipelineError::precondition(
            step,
            format!("no .mcd files found in {}", level_dir.display()),
        )),
        1 => Ok(mcd_files.remove(0)),
        n => Err(PipelineError::precondition(
            step,
            format!("{} .mcd files found in {}", n, level_dir.display()),
        )),
    }
}

impl<R: StageRunner> Orchestrator<R> {
    fn camera_jobs(
        &self,
        step: Step,
        dataset: &Dataset,
        catalog: &SensorCatalog,
    ) -> StepResult<Vec<CameraJob>> {
        let paths = dataset.paths();
        let localization = self.config.depth_maps.localization_name.as_deref();

        catalog
            .sensors_of_type(CAMERAS)
            .iter()
            .map(|camera| {
                let datadir = catalog
                    .property(camera, CAMERA_OUTPUT_DIRECTORY, CAMERAS)
                    .map_err(|e| PipelineError::configuration(step, e.to_string()))?;
                let image_dir = paths.resolve(Path::new(datadir).join(".."));
                let mcdfile = find_level_mcd(step, &image_dir.join("rectified").join("level"))?;

                let posefile = paths.camera_pose_file(camera.name(), localization);
                require_file(step, &posefile, &format!("pose file of camera {}", camera.name()))?;

                Ok(CameraJob {
                    name: camera.name().to_string(),
                    mcdfile,
                    posefile,
                    outdir: paths.camera_imagemap_dir(camera.name()),
                })
            })
            .collect()
    }

    /// Render depth and normal maps for every camera's rectified `level`
    /// images, in a single launch of the rendering stage.
    ///
    /// With no cameras configured this succeeds without launching anything.
    pub fn generate_depth_maps(&self, dataset_dir: &Path) -> StepResult<FamilyReport> {
        let step = Step::DepthMaps;
        let dataset = self.open_dataset(step, dataset_dir)?;
        let catalog = self.load_catalog(step, &dataset)?;

        if catalog.sensors_of_type(CAMERAS).is_empty() {
            return Ok(self.skip(
                Family::DepthMaps,
                &format!("no active cameras found in dataset {}", dataset.root().display()),
            ));
        }

        let options = &self.config.depth_maps;
        let model = match &options.model_file {
            Some(model) => dataset.paths().resolve(model),
            None => dataset.paths().surface_model(),
        };
        require_file(step, &model, "surface model")?;

        let jobs = self.camera_jobs(step, &dataset, &catalog)?;
        for job in &jobs {
            prepare_output_dir(step, &job.outdir)?;
        }

        let mut invocation = Invocation::new(&self.toolchain.executables.depth_maps, dataset.root())
            .arg("-dir")
            .arg(dataset.root())
            .arg("-model")
            .arg(&model)
            .arg("-depth")
            .arg(options.depth.to_string());
        for job in &jobs {
            invocation.push_arg("-i");
            invocation.push_arg(&job.mcdfile);
            invocation.push_arg(&job.posefile);
            invocation.push_arg(&job.outdir);
            invocation.push_arg(&job.name);
        }
        if let Some(threads) = options.threads {
            invocation.push_arg("-threads");
            invocation.push_arg(threads.to_string());
        }
        if let Some(downsample) = options.downsample {
            invocation.push_arg("-ds");
            invocation.push_arg(downsample.to_string());
        }

        tracing::info!("Generating depth maps for {} cameras", jobs.len());
        self.launch(step, &invocation)?;

        Ok(FamilyReport {
            family: Family::DepthMaps,
            stages_run: 1,
            outputs: jobs.into_iter().map(|j| j.outdir).collect(),
            skipped: false,
        })
    }
}
