//! Sensor catalog built from the dataset hardware configuration.

mod catalog;

pub use catalog::{
    CatalogError, CatalogOptions, SensorCatalog, SensorDescriptor, HARDWARE_ROOT,
};

/// Type tag of the laser range scanners.
pub const LASERS: &str = "lasers";

/// Type tag of the cameras.
pub const CAMERAS: &str = "cameras";

/// Property naming a laser's raw scan file, relative to the dataset root.
pub const URG_DATAFILE: &str = "configFile/urg_datafile";

/// Property naming a camera's raw image directory, relative to the dataset root.
pub const CAMERA_OUTPUT_DIRECTORY: &str = "configFile/dalsa_output_directory";
