//! Pipeline orchestration for the native geometry stages.

mod chunker;
mod depth_maps;
mod floorplan;
mod metrics;
mod orchestrator;
mod output_dir;
mod scan_filter;


pub use metrics::{Metrics, MetricsSnapshot, StepTime};
pub use orchestrator::{Family, FamilyReport, Orchestrator};
pub use output_dir::prepare_output_dir;
