//! Structured failures for pipeline steps.
//!
//! Every failure carries the [`Step`] that produced it, so a caller can tell
//! which native stage (or which precondition) stopped the run. [`PipelineError::code`]
//! maps each (step, kind) pair to a distinct negative integer for scripted callers.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Identity of a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// `scan_chunker` over the carve map and wedge file
    ChunkGeneration,
    /// `filter_urg_scans`, once per laser
    ScanFiltering,
    /// `oct2dq`, first half of the floorplan chain
    OctreeToDq,
    /// `floorplan_gen`, second half of the floorplan chain
    FloorplanGeneration,
    /// `depth_maps`, batched over every camera
    DepthMaps,
}

impl Step {
    /// All steps in full-run order.
    pub const ALL: [Step; 5] = [
        Step::ScanFiltering,
        Step::ChunkGeneration,
        Step::OctreeToDq,
        Step::FloorplanGeneration,
        Step::DepthMaps,
    ];

    fn ordinal(self) -> i32 {
        match self {
            Step::ChunkGeneration => 1,
            Step::ScanFiltering => 2,
            Step::OctreeToDq => 3,
            Step::FloorplanGeneration => 4,
            Step::DepthMaps => 5,
        }
    }

    /// Short name used in logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            Step::ChunkGeneration => "chunk-generation",
            Step::ScanFiltering => "scan-filtering",
            Step::OctreeToDq => "octree-to-dq",
            Step::FloorplanGeneration => "floorplan-generation",
            Step::DepthMaps => "depth-maps",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Broad category of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Precondition,
    FilesystemState,
    StageExecution,
    StageLaunch,
}

impl ErrorKind {
    fn ordinal(self) -> i32 {
        match self {
            ErrorKind::Configuration => 1,
            ErrorKind::Precondition => 2,
            ErrorKind::FilesystemState => 3,
            ErrorKind::StageExecution => 4,
            ErrorKind::StageLaunch => 5,
        }
    }
}

/// Failure of a pipeline step.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A settings or hardware-config document is missing, malformed, or lacks a required key.
    #[error("[{step}] configuration error: {message}")]
    Configuration { step: Step, message: String },

    /// A required input artifact is not available.
    #[error("[{step}] precondition failed: {message}")]
    Precondition { step: Step, message: String },

    /// An output location is unusable (not a directory, or could not be created or cleared).
    #[error("[{step}] output location {}: {message}", path.display())]
    FilesystemState {
        step: Step,
        path: PathBuf,
        message: String,
    },

    /// The native stage ran and reported failure.
    #[error(
        "[{step}] {executable} returned error {exit_code}{}",
        detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
    )]
    StageExecution {
        step: Step,
        executable: String,
        exit_code: i32,
        detail: Option<String>,
    },

    /// The native stage could not be started at all.
    #[error("[{step}] unable to launch {}: {source}", executable.display())]
    StageLaunch {
        step: Step,
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn configuration(step: Step, message: impl Into<String>) -> Self {
        PipelineError::Configuration {
            step,
            message: message.into(),
        }
    }

    pub fn precondition(step: Step, message: impl Into<String>) -> Self {
        PipelineError::Precondition {
            step,
            message: message.into(),
        }
    }

    /// The step that failed.
    pub fn step(&self) -> Step {
        match self {
            PipelineError::Configuration { step, .. }
            | PipelineError::Precondition { step, .. }
            | PipelineError::FilesystemState { step, .. }
            | PipelineError::StageExecution { step, .. }
            | PipelineError::StageLaunch { step, .. } => *step,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration { .. } => ErrorKind::Configuration,
            PipelineError::Precondition { .. } => ErrorKind::Precondition,
            PipelineError::FilesystemState { .. } => ErrorKind::FilesystemState,
            PipelineError::StageExecution { .. } => ErrorKind::StageExecution,
            PipelineError::StageLaunch { .. } => ErrorKind::StageLaunch,
        }
    }

    /// Native exit code, when the failure came from a stage that ran.
    pub fn native_exit_code(&self) -> Option<i32> {
        match self {
            PipelineError::StageExecution { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Negative process exit code identifying the step and the failure kind.
    ///
    /// Computed as `-(10 * step + kind)`, e.g. `-14` is a `scan_chunker` failure
    /// and `-31` a bad oct2dq settings file.
    pub fn code(&self) -> i32 {
        -(10 * self.step().ordinal() + self.kind().ordinal())
    }
}

pub type StepResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique_per_step_and_kind() {
        let kinds = [
            ErrorKind::Configuration,
            ErrorKind::Precondition,
            ErrorKind::FilesystemState,
            ErrorKind::StageExecution,
            ErrorKind::StageLaunch,
        ];
        let mut seen = HashSet::new();
        for step in Step::ALL {
            for kind in kinds {
                let code = -(10 * step.ordinal() + kind.ordinal());
                assert!(code < 0);
                assert!(seen.insert(code), "duplicate code {code}");
            }
        }
        assert_eq!(seen.len(), 25);
    }

    #[test]
    fn test_stage_execution_code_and_message() {
        let err = PipelineError::StageExecution {
            step: Step::OctreeToDq,
            executable: "oct2dq".to_string(),
            exit_code: 7,
            detail: None,
        };
        assert_eq!(err.code(), -34);
        assert_eq!(err.native_exit_code(), Some(7));
        assert_eq!(err.to_string(), "[octree-to-dq] oct2dq returned error 7");
    }

    #[test]
    fn test_configuration_code() {
        let err = PipelineError::configuration(Step::ChunkGeneration, "bad settings");
        assert_eq!(err.code(), -11);
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.native_exit_code(), None);
    }
}
