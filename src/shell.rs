//! Running commands on this machine.
//!
//! A `Cmd` is a program plus its argument vector, along with how the caller wants it run (in
//! which directory, and whether to capture its output). Anything that can run a `Cmd` implements
//! `Execute`. `HostShell` is the only implementation that actually spawns processes; the shells
//! in `crate::dispatch` rewrite commands and hand them to it.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard};

use console::style;

use crate::error::{ExitStatus, RunnerError};

/// A command to be run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    argv: Vec<String>,
    cwd: Option<String>,
    capture: bool,
}

impl Cmd {
    /// A command that runs `program` with no arguments, in the caller's working directory, with
    /// its output flowing to the terminal.
    pub fn new<S: Into<String>>(program: S) -> Self {
        Cmd {
            argv: vec![program.into()],
            cwd: None,
            capture: false,
        }
    }

    /// Append one argument.
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.argv.push(arg.into());
        self
    }

    /// Append each of the given arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command from the given directory instead of the caller's.
    pub fn cwd<S: Into<String>>(mut self, cwd: S) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Capture stdout and stderr into the `RunOutput` instead of inheriting them.
    pub fn capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn get_cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    pub fn is_captured(&self) -> bool {
        self.capture
    }

    /// The command as a single expression `bash -c` would run with the same argument vector.
    pub fn to_shell_string(&self) -> String {
        self.argv
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for Cmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_shell_string())
    }
}

/// Quote `arg` for bash if it contains anything other than characters that are always taken
/// literally. Single quotes inside the argument become `'\''`.
pub fn shell_quote(arg: &str) -> String {
    fn is_plain(c: char) -> bool {
        c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c)
    }

    if !arg.is_empty() && arg.chars().all(is_plain) {
        arg.to_owned()
    } else {
        format!("'{}'", arg.replace('\'', r#"'\''"#))
    }
}

/// What a finished command left behind. `stdout` and `stderr` are empty unless the command was
/// captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus(self.status)
    }

    /// Print whatever was captured. Does nothing for uncaptured runs.
    pub fn print(&self) {
        if !self.stdout.is_empty() {
            print!("{}", self.stdout);
        }
        if !self.stderr.is_empty() {
            eprint!("{}", self.stderr);
        }
    }
}

/// Something that can run a `Cmd` to completion.
///
/// A non-zero exit status is not an error; callers decide what it means. `Err` is reserved for
/// commands that could not be run at all.
#[cfg_attr(test, mockall::automock)]
pub trait Execute {
    fn run(&self, cmd: &Cmd) -> Result<RunOutput, RunnerError>;
}

/// Runs commands as child processes of this one.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostShell;

impl HostShell {
    pub fn new() -> Self {
        HostShell
    }
}

impl Execute for HostShell {
    fn run(&self, cmd: &Cmd) -> Result<RunOutput, RunnerError> {
        let launch_failure = |cause| RunnerError::LaunchFailure {
            cmd: cmd.to_shell_string(),
            cause,
        };

        match cmd.get_cwd() {
            Some(cwd) => println!("{}", style(format!("[{}] $ {}", cwd, cmd)).yellow().bold()),
            None => println!("{}", style(format!("$ {}", cmd)).yellow().bold()),
        }

        // Held until the child has exited, so the directory is restored on every path out of
        // this function.
        let _wd = match cmd.get_cwd() {
            Some(cwd) => Some(WorkingDir::enter(cwd).map_err(launch_failure)?),
            None => None,
        };

        let mut child = std::process::Command::new(OsStr::new(cmd.program()));
        child.args(&cmd.argv()[1..]);

        let output = if cmd.is_captured() {
            let out = child
                .stdin(Stdio::inherit())
                .output()
                .map_err(launch_failure)?;
            RunOutput {
                status: out.status.code(),
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            }
        } else {
            let status = child.status().map_err(launch_failure)?;
            RunOutput {
                status: status.code(),
                ..RunOutput::default()
            }
        };

        log::debug!("`{}` exited with {}", cmd, output.exit_status());

        Ok(output)
    }
}

/// Serializes changes of the process working directory.
static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Lock out working-directory changes by `HostShell` for as long as the guard lives.
pub(crate) fn cwd_lock() -> MutexGuard<'static, ()> {
    // A panic while the lock was held still restored the directory (see `WorkingDir::drop`).
    CWD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// While alive, the process runs in another directory. Dropping it goes back to the directory
/// that was current when it was created.
#[derive(Debug)]
pub struct WorkingDir {
    prev: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl WorkingDir {
    pub fn enter<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let lock = cwd_lock();
        let prev = std::env::current_dir()?;
        std::env::set_current_dir(dir.as_ref())?;
        log::trace!("entered {} (from {})", dir.as_ref().display(), prev.display());

        Ok(WorkingDir { prev, _lock: lock })
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        if let Err(err) = std::env::set_current_dir(&self.prev) {
            log::error!(
                "unable to return to working directory {}: {}",
                self.prev.display(),
                err
            );
        }
    }
}
