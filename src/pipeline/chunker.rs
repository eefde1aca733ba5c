//! Chunk generation: `scan_chunker` over the carve map and wedge file.

use super::orchestrator::{require_file, Family, FamilyReport, Orchestrator};
use super::output_dir::prepare_output_dir;
use crate::error::{PipelineError, Step, StepResult};
use crate::settings::ChunkerSettings;
use crate::stage::{Invocation, StageRunner};
use std::path::Path;

impl<R: StageRunner> Orchestrator<R> {
    /// Split the carve map into chunk files listed by the dataset's chunk list.
    ///
    /// Chunk files go to the settings' `procarve_chunkdir`, relative to the
    /// chunk list, which is emptied first.
    pub fn generate_chunks(&self, dataset_dir: &Path) -> StepResult<FamilyReport> {
        let step = Step::ChunkGeneration;
        let dataset = self.open_dataset(step, dataset_dir)?;
        let paths = dataset.paths();

        let settings = ChunkerSettings::load(&self.toolchain.procarve_settings).map_err(|e| {
            PipelineError::configuration(step, format!("invalid settings file: {e}"))
        })?;

        let cmfile = paths.carvemap_file();
        let wedgefile = paths.wedgefile();
        let chunklist = paths.chunklist();
        require_file(step, &cmfile, "carve map")?;
        require_file(step, &wedgefile, "wedge file")?;

        let chunkdir = paths.chunk_dir(settings.chunkdir());
        let carving_dir = chunklist.parent().unwrap_or(dataset.root());
        if chunkdir == carving_dir || !chunkdir.starts_with(carving_dir) {
            return Err(PipelineError::configuration(
                step,
                format!(
                    "chunk directory {} must lie below {}",
                    chunkdir.display(),
                    carving_dir.display()
                ),
            ));
        }
        prepare_output_dir(step, &chunkdir)?;

        let invocation = Invocation::new(&self.toolchain.executables.scan_chunker, dataset.root())
            .arg("-m")
            .arg(&cmfile)
            .arg("-w")
            .arg(&wedgefile)
            .arg("-o")
            .arg(&chunklist)
            .arg("-s")
            .arg(settings.path());
        self.launch(step, &invocation)?;

        Ok(FamilyReport {
            family: Family::Chunking,
            stages_run: 1,
            outputs: vec![chunklist, chunkdir],
            skipped: false,
        })
    }
}
