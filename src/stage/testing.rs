//! Scripted stage runner for tests.

use super::{Invocation, StageRunner, StageStatus};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

/// Records every invocation instead of spawning processes.
///
/// Exit codes are scripted per program name; unscripted launches exit 0.
/// An optional probe directory is listed at each launch so tests can check
/// what a stage would have seen.
#[derive(Default)]
pub struct ScriptedRunner {
    exit_codes: Mutex<HashMap<String, VecDeque<i32>>>,
    missing: Vec<String>,
    probe: Option<PathBuf>,
    calls: Mutex<Vec<Invocation>>,
    probe_listings: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue exit codes for successive launches of `program`.
    pub fn exit_codes(self, program: &str, codes: &[i32]) -> Self {
        self.exit_codes
            .lock()
            .unwrap()
            .entry(program.to_string())
            .or_default()
            .extend(codes.iter().copied());
        self
    }

    /// Make launches of `program` fail as if the executable did not exist.
    pub fn missing(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    pub fn probe(mut self, dir: impl Into<PathBuf>) -> Self {
        self.probe = Some(dir.into());
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program_name() == program)
            .count()
    }

    pub fn probe_listings(&self) -> Vec<Vec<String>> {
        self.probe_listings.lock().unwrap().clone()
    }
}

impl StageRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<StageStatus> {
        if let Some(dir) = &self.probe {
            let mut entries: Vec<String> = match std::fs::read_dir(dir) {
                Ok(rd) => rd
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect(),
                Err(_) => vec!["<unreadable>".to_string()],
            };
            entries.sort();
            self.probe_listings.lock().unwrap().push(entries);
        }

        self.calls.lock().unwrap().push(invocation.clone());

        let program = invocation.program_name();
        if self.missing.contains(&program) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{program} not found"),
            ));
        }

        let code = self
            .exit_codes
            .lock()
            .unwrap()
            .get_mut(&program)
            .and_then(VecDeque::pop_front)
            .unwrap_or(0);
        Ok(StageStatus::Exited(code))
    }
}
