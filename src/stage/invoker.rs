//! Launching native stages.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// One planned launch of a native stage: executable, discrete argument
/// tokens, and working directory. No shell ever sees these tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    executable: PathBuf,
    args: Vec<OsString>,
    working_dir: PathBuf,
}

impl Invocation {
    pub fn new(executable: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn push_arg(&mut self, arg: impl AsRef<OsStr>) {
        self.args.push(arg.as_ref().to_os_string());
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// File name of the executable, for logs and error reports.
    pub fn program_name(&self) -> String {
        self.executable
            .file_name()
            .unwrap_or(self.executable.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.executable.display())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// How a stage process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Normal exit with the process's status code.
    Exited(i32),
    /// Terminated by a signal (unix only).
    Signaled(i32),
}

impl StageStatus {
    pub fn success(&self) -> bool {
        matches!(self, StageStatus::Exited(0))
    }

    /// Status as a single integer: the exit code, or the negated signal number.
    pub fn code(&self) -> i32 {
        match self {
            StageStatus::Exited(code) => *code,
            StageStatus::Signaled(signal) => -signal,
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Exited(code) => write!(f, "exit status {}", code),
            StageStatus::Signaled(signal) => write!(f, "signal {}", signal),
        }
    }
}

/// Runs native stages synchronously.
///
/// A non-zero exit is reported as data; `Err` means the process could not be
/// started (or waited on) at all.
pub trait StageRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<StageStatus>;
}

impl<R: StageRunner + ?Sized> StageRunner for &R {
    fn run(&self, invocation: &Invocation) -> std::io::Result<StageStatus> {
        (**self).run(invocation)
    }
}

impl<R: StageRunner + ?Sized> StageRunner for Box<R> {
    fn run(&self, invocation: &Invocation) -> std::io::Result<StageStatus> {
        (**self).run(invocation)
    }
}

/// Spawns the stage as a child process with inherited standard streams and
/// blocks until it exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl StageRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<StageStatus> {
        let status = Command::new(invocation.executable())
            .args(invocation.arguments())
            .current_dir(invocation.working_dir())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;

        if let Some(code) = status.code() {
            return Ok(StageStatus::Exited(code));
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Ok(StageStatus::Signaled(signal));
            }
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("{} ended without an exit status", invocation.program_name()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = Invocation::new("/opt/bin/scan_chunker", "/data/run1")
            .args(["-m", "a.cm"])
            .arg("-w")
            .arg(Path::new("b wedge.wedge"));
        assert_eq!(inv.program_name(), "scan_chunker");
        assert_eq!(inv.arguments().len(), 4);
        assert_eq!(inv.arguments()[3], OsString::from("b wedge.wedge"));
        assert_eq!(
            inv.to_string(),
            "/opt/bin/scan_chunker -m a.cm -w \"b wedge.wedge\""
        );
    }

    #[test]
    fn test_status_code() {
        assert!(StageStatus::Exited(0).success());
        assert!(!StageStatus::Exited(3).success());
        assert_eq!(StageStatus::Exited(3).code(), 3);
        assert!(!StageStatus::Signaled(9).success());
        assert_eq!(StageStatus::Signaled(9).code(), -9);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_reports_exit_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let ok = Invocation::new("/bin/sh", dir.path()).args(["-c", "exit 0"]);
        assert_eq!(ProcessRunner.run(&ok).unwrap(), StageStatus::Exited(0));

        let failing = Invocation::new("/bin/sh", dir.path()).args(["-c", "exit 3"]);
        assert_eq!(ProcessRunner.run(&failing).unwrap(), StageStatus::Exited(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_uses_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("/bin/sh", dir.path()).args(["-c", "touch marker"]);
        assert!(ProcessRunner.run(&inv).unwrap().success());
        assert!(dir.path().join("marker").exists());
    }

    #[test]
    fn test_process_runner_missing_executable() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new(dir.path().join("no_such_stage"), dir.path());
        assert!(ProcessRunner.run(&inv).is_err());
    }
}
