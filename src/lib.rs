//! Backpack Reconstruction Pipeline
//!
//! Drives the native geometry stages of the backpack 3D-reconstruction
//! toolchain over a captured dataset directory.
//!
//! # Architecture
//!
//! The pipeline consists of:
//!
//! - **Dataset**: Canonical artifact paths under a dataset root
//! - **Settings**: Stage XML settings files with typed per-stage views
//! - **Hardware**: Sensor catalog parsed from the dataset hardware config
//! - **Stage**: Synchronous launch of native executables with explicit argv
//! - **Pipeline**: The four stage families, their precondition checks, and run metrics
//!
//! # Usage
//!
//! ```no_run
//! use backpack_pipeline::{Config, Orchestrator, ProcessRunner};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file(Path::new("pipeline.yaml"))?;
//!     config.validate()?;
//!     let toolchain = config.toolchain()?;
//!
//!     let orchestrator = Orchestrator::new(config, toolchain, ProcessRunner);
//!     orchestrator.run_all(Path::new("/data/run1"), Path::new("/data/run1.mad"))?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod hardware;
pub mod pipeline;
pub mod settings;
pub mod stage;

pub use config::{Config, FailurePolicy, Toolchain};
pub use dataset::{Dataset, DatasetPaths};
pub use error::{ErrorKind, PipelineError, Step, StepResult};
pub use hardware::{SensorCatalog, SensorDescriptor};
pub use pipeline::{Family, FamilyReport, Metrics, MetricsSnapshot, Orchestrator};
pub use settings::{ChunkerSettings, Oct2dqSettings, SettingsDocument};
pub use stage::{Invocation, ProcessRunner, StageRunner, StageStatus};
