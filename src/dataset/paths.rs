//! Dataset directory layout.
//!
//! Every artifact a stage reads or writes lives at a fixed location relative to
//! the dataset root. [`DatasetPaths`] computes those locations without touching
//! the filesystem.

use std::path::{Component, Path, PathBuf};

const HARDWARE_CONFIG: &str = "config/backpack_config.xml";
const TIMESYNC: &str = "time/time_sync.xml";
const NOISYPATH: &str = "localization/noisypath.noisypath";
const LOCALIZATION_DIR: &str = "localization";
const CARVING_DIR: &str = "models/carving";
const OCTREE: &str = "carving.oct";
const CARVEMAP: &str = "carvemap.cm";
const WEDGEFILE: &str = "wedges.wedge";
const CHUNKLIST: &str = "chunklist.chunklist";
const SURFACE_MODEL: &str = "carving.obj";
const CARVING_FP_DIR: &str = "models/floorplan/carving";
const DQ_FILE: &str = "carving.dq";
const FP_FILE: &str = "carving.fp";
const IMAGEMAP_DIR: &str = "imagemaps";

/// Extension of filtered range scans.
pub const FSS_EXTENSION: &str = "fss";

/// Canonical artifact locations for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    root: PathBuf,
}

impl DatasetPaths {
    /// Build the layout for a dataset root given as a relative or absolute path.
    ///
    /// Relative roots are resolved against the current directory; `.` and `..`
    /// components are collapsed lexically.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            root: normalize_path(&absolute),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a dataset-relative path (as declared in hardware config files).
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        normalize_path(&self.root.join(relative))
    }

    pub fn hardware_config_xml(&self) -> PathBuf {
        self.root.join(HARDWARE_CONFIG)
    }

    pub fn timesync_xml(&self) -> PathBuf {
        self.root.join(TIMESYNC)
    }

    pub fn noisypath_file(&self) -> PathBuf {
        self.root.join(NOISYPATH)
    }

    pub fn octree(&self) -> PathBuf {
        self.root.join(CARVING_DIR).join(OCTREE)
    }

    pub fn carvemap_file(&self) -> PathBuf {
        self.root.join(CARVING_DIR).join(CARVEMAP)
    }

    pub fn wedgefile(&self) -> PathBuf {
        self.root.join(CARVING_DIR).join(WEDGEFILE)
    }

    pub fn chunklist(&self) -> PathBuf {
        self.root.join(CARVING_DIR).join(CHUNKLIST)
    }

    /// Directory holding chunk files, given the sub-directory named in the
    /// chunker settings (relative to the chunk list's directory).
    pub fn chunk_dir(&self, relative_chunkdir: impl AsRef<Path>) -> PathBuf {
        let chunklist = self.chunklist();
        let base = chunklist.parent().unwrap_or(&self.root);
        normalize_path(&base.join(relative_chunkdir))
    }

    /// Carved surface mesh rendered by the depth-map stage.
    pub fn surface_model(&self) -> PathBuf {
        self.root.join(CARVING_DIR).join(SURFACE_MODEL)
    }

    pub fn carving_fp_dir(&self) -> PathBuf {
        self.root.join(CARVING_FP_DIR)
    }

    pub fn carving_dq_file(&self) -> PathBuf {
        self.carving_fp_dir().join(DQ_FILE)
    }

    pub fn carving_fp_file(&self) -> PathBuf {
        self.carving_fp_dir().join(FP_FILE)
    }

    pub fn imagemap_dir(&self) -> PathBuf {
        self.root.join(IMAGEMAP_DIR)
    }

    /// Output directory for one camera's depth and normal maps.
    pub fn camera_imagemap_dir(&self, camera: &str) -> PathBuf {
        self.imagemap_dir().join(camera)
    }

    /// Pose file for one camera. `localization_name` selects a named
    /// localization run under `localization/`.
    pub fn camera_pose_file(&self, camera: &str, localization_name: Option<&str>) -> PathBuf {
        let mut dir = self.root.join(LOCALIZATION_DIR);
        if let Some(name) = localization_name {
            dir.push(name);
        }
        dir.join("cameraposes").join(format!("{camera}_poses.txt"))
    }
}

/// Filtered-scan file produced from a raw sensor file: same stem, `.fss` extension.
pub fn fss_file_for(raw_file: &Path) -> PathBuf {
    raw_file.with_extension(FSS_EXTENSION)
}

/// Collapse `.` and `..` components without consulting the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // never pop past the root or a prefix
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
