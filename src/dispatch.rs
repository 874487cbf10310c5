//! Choosing where a command runs.
//!
//! Everything above this module is written against `Execute` and does not care whether commands
//! run directly on the host or inside the simulator container. `dispatcher` picks the strategy
//! once from the `Config`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::RunnerError,
    shell::{Cmd, Execute, RunOutput},
    Config, Mode,
};

/// Everything needed to run a command inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// The container runtime CLI (e.g. `docker` or `podman`).
    pub runtime: String,
    /// The image to run.
    pub image: String,
    /// Absolute path of the host directory that is bind-mounted into the container.
    pub host_dir: String,
    /// Where `host_dir` appears inside the container.
    pub mount_point: String,
    /// The working directory inside the container when the caller does not ask for one.
    pub workdir: String,
}

impl Environment {
    /// The environment described by `cfg`. The default workdir is the mount point.
    pub fn from_config(cfg: &Config) -> Self {
        Environment {
            runtime: cfg.runtime.clone(),
            image: cfg.image.clone(),
            host_dir: cfg.host_dir.clone(),
            mount_point: cfg.mount_point.clone(),
            workdir: cfg.mount_point.clone(),
        }
    }

    /// Map a working-directory override (as given to `Cmd::cwd`) to the directory inside the
    /// container. Relative paths are taken relative to the mount point; absolute paths must be
    /// under `host_dir`.
    pub fn container_dir(&self, cwd: Option<&str>) -> Result<String, RunnerError> {
        let cwd = match cwd {
            None => return Ok(self.workdir.clone()),
            Some(cwd) => cwd,
        };

        let rel = if Path::new(cwd).is_absolute() {
            Path::new(cwd)
                .strip_prefix(&self.host_dir)
                .map_err(|_| RunnerError::OutsideMount {
                    path: cwd.to_owned(),
                    host_dir: self.host_dir.clone(),
                })?
                .to_string_lossy()
                .into_owned()
        } else {
            cwd.to_owned()
        };

        if rel.is_empty() {
            Ok(self.mount_point.clone())
        } else {
            Ok(dir!(&self.mount_point, &rel))
        }
    }

    /// The host path of a directory inside the container. Returns `None` if `dir` is not under
    /// the mount point.
    pub fn host_path(&self, dir: &str) -> Option<PathBuf> {
        Path::new(dir)
            .strip_prefix(&self.mount_point)
            .ok()
            .map(|rel| Path::new(&self.host_dir).join(rel))
    }

    /// The `run` invocation that executes `inner` as a `bash -c` expression in `workdir`.
    fn wrap(&self, workdir: &str, inner: String) -> Cmd {
        cmd!(
            &self.runtime,
            "run",
            "--rm",
            "--privileged",
            "-t",
            "-v",
            format!("{}:{}", self.host_dir, self.mount_point),
            "-w",
            workdir,
            &self.image,
            "bash",
            "-c",
            inner,
        )
    }
}

/// Runs commands directly on the host.
pub struct NativeShell<'b> {
    backend: &'b dyn Execute,
}

impl<'b> NativeShell<'b> {
    pub fn new(backend: &'b dyn Execute) -> Self {
        NativeShell { backend }
    }
}

impl Execute for NativeShell<'_> {
    fn run(&self, cmd: &Cmd) -> Result<RunOutput, RunnerError> {
        self.backend.run(cmd)
    }
}

/// Runs commands inside a fresh container of the environment image.
pub struct ContainerShell<'b> {
    backend: &'b dyn Execute,
    env: Environment,
}

impl<'b> ContainerShell<'b> {
    pub fn new(backend: &'b dyn Execute, env: Environment) -> Self {
        ContainerShell { backend, env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// The host-side command that runs `cmd` in the container.
    pub fn wrap(&self, cmd: &Cmd) -> Result<Cmd, RunnerError> {
        let workdir = self.env.container_dir(cmd.get_cwd())?;
        Ok(self
            .env
            .wrap(&workdir, cmd.to_shell_string())
            .capture(cmd.is_captured()))
    }
}

impl Execute for ContainerShell<'_> {
    fn run(&self, cmd: &Cmd) -> Result<RunOutput, RunnerError> {
        log::debug!("running `{}` in {}", cmd, self.env.image);
        self.backend.run(&self.wrap(cmd)?)
    }
}

/// Pick the shell for the configured execution mode.
pub fn dispatcher<'b>(cfg: &Config, backend: &'b dyn Execute) -> Box<dyn Execute + 'b> {
    match cfg.mode {
        Mode::Native => Box::new(NativeShell::new(backend)),
        Mode::Isolated => Box::new(ContainerShell::new(backend, Environment::from_config(cfg))),
    }
}
