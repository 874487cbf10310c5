//! The ways a pipeline run can go wrong.
//!
//! `LaunchFailure`, `BuildFailure` and `OutsideMount` abort the pipeline. Everything that happens
//! while running or collecting a single benchmark is recorded against that benchmark only.

use failure_derive::Fail;

#[derive(Debug, Fail)]
pub enum RunnerError {
    /// The program could not be started, or the requested working directory could not be
    /// entered.
    #[fail(display = "unable to launch `{}`: {}", cmd, cause)]
    LaunchFailure {
        cmd: String,
        #[fail(cause)]
        cause: std::io::Error,
    },

    /// The image build or the compile step exited unsuccessfully.
    #[fail(display = "{} failed with exit status {}", step, status)]
    BuildFailure { step: String, status: ExitStatus },

    /// A benchmark (or the simulator running it) exited unsuccessfully.
    #[fail(display = "benchmark `{}` failed with exit status {}", bench, status)]
    RunFailure { bench: String, status: ExitStatus },

    /// The simulator did not leave an artifact behind.
    #[fail(display = "benchmark `{}` produced no artifact at {}", bench, path)]
    ArtifactMissing { bench: String, path: String },

    /// The artifact exists but could not be moved into the results directory.
    #[fail(display = "unable to move {} to {}: {}", from, to, cause)]
    Relocate {
        from: String,
        to: String,
        #[fail(cause)]
        cause: std::io::Error,
    },

    /// A working directory was requested that the environment cannot see.
    #[fail(
        display = "{} is outside of the directory mounted into the environment ({})",
        path, host_dir
    )]
    OutsideMount { path: String, host_dir: String },
}

/// The exit status of a child process. `None` means it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(pub Option<i32>);

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(code) => write!(f, "{}", code),
            None => write!(f, "<signal>"),
        }
    }
}

impl RunnerError {
    /// Returns true if the command behind this error never ran, so it cannot have left anything
    /// behind.
    pub fn never_ran(&self) -> bool {
        match self {
            RunnerError::LaunchFailure { .. } | RunnerError::OutsideMount { .. } => true,
            RunnerError::BuildFailure { .. }
            | RunnerError::RunFailure { .. }
            | RunnerError::ArtifactMissing { .. }
            | RunnerError::Relocate { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = RunnerError::BuildFailure {
            step: "compile".into(),
            status: ExitStatus(Some(2)),
        };
        assert_eq!(err.to_string(), "compile failed with exit status 2");

        let err = RunnerError::RunFailure {
            bench: "gemm".into(),
            status: ExitStatus(None),
        };
        assert_eq!(
            err.to_string(),
            "benchmark `gemm` failed with exit status <signal>"
        );
        assert!(!err.never_ran());
    }

    #[test]
    fn launch_failure_keeps_cause() {
        use failure::Fail;

        let err = RunnerError::LaunchFailure {
            cmd: "nope --flag".into(),
            cause: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.never_ran());
        assert!(err.cause().is_some());
        assert!(err.to_string().starts_with("unable to launch `nope --flag`"));
    }
}
