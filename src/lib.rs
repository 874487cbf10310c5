//! A library of routines for compiling the MFMA micro-benchmarks and running them, either
//! directly on the host or under gem5 inside the simulator container.

// Must be imported first because the other submodules use the macros defined therein.
#[macro_use]
mod macros;

pub mod bench;
pub mod cli;
pub mod dispatch;
pub mod error;
pub mod gem5;
pub mod pipeline;
pub mod shell;

pub mod build_image;
pub mod list;
pub mod mfma;

use serde::{Deserialize, Serialize};

pub use crate::error::RunnerError;

/// Default paths and names. Relative paths are relative to the host directory (on the host) or
/// the mount point (in the container).
pub mod paths {
    /// The name of the simulator image.
    pub const IMAGE_NAME: &str = "mi200-container";

    /// The directory containing the `Dockerfile` for the simulator image.
    pub const DOCKERFILE_DIR: &str = "docker";

    /// The container runtime CLI.
    pub const CONTAINER_RUNTIME: &str = "docker";

    /// Where the host directory is mounted in the container.
    pub const MOUNT_POINT: &str = "/workspace";

    /// The benchmark directory. Sources are in `src/`, binaries are built next to it.
    pub const BENCH_DIR: &str = "matrix-cores";

    /// The build tool.
    pub const MAKE: &str = "make";

    /// The gem5 binary.
    pub const GEM5_BINARY: &str = "gem5/build/VEGA_X86/gem5.opt";

    /// The gem5 config script for the MI200 full-system simulation.
    pub const GEM5_CONFIG: &str = "gem5/configs/example/gpufs/mi200.py";

    /// The directory with the kernel and disk images.
    pub const RESOURCES_DIR: &str = "gem5-resources";

    /// The kernel image, in `RESOURCES_DIR`.
    pub const KERNEL_IMAGE: &str = "vmlinux-gpu-ml";

    /// The disk image, in `RESOURCES_DIR`.
    pub const DISK_IMAGE: &str = "x86-ubuntu-gpu-ml";

    /// Where artifacts and run records go.
    pub const RESULTS_DIR: &str = ".";
}

/// Where commands run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Directly on this machine. Benchmarks run on the real GPU.
    Native,
    /// In a fresh container of the simulator image. Benchmarks run under gem5.
    Isolated,
}

/// Everything a pipeline run needs to know. Built once from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mode: Mode,

    pub image: String,
    pub dockerfile_dir: String,
    pub runtime: String,
    /// Absolute path of the directory holding the benchmarks, gem5, and resources.
    pub host_dir: String,
    pub mount_point: String,

    pub bench_dir: String,
    pub make: String,

    pub gem5: String,
    pub gem5_config: String,
    pub resources_dir: String,
    pub kernel: String,
    pub disk_image: String,
    pub hw_flags: Vec<String>,

    /// Capture the output of commands and print it once they are done.
    pub capture: bool,
    pub results_dir: String,

    pub timestamp: String,
}

impl Config {
    /// Names of the params and timing records for this run: `(params, time)`.
    pub fn gen_standard_names(&self) -> (String, String) {
        let base = format!("{}-mfma", self.timestamp);
        (format!("{}.params", base), format!("{}.time", base))
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Config {
            mode: Mode::Native,
            image: paths::IMAGE_NAME.into(),
            dockerfile_dir: paths::DOCKERFILE_DIR.into(),
            runtime: paths::CONTAINER_RUNTIME.into(),
            host_dir: "/home/me/mfma".into(),
            mount_point: paths::MOUNT_POINT.into(),
            bench_dir: paths::BENCH_DIR.into(),
            make: paths::MAKE.into(),
            gem5: paths::GEM5_BINARY.into(),
            gem5_config: paths::GEM5_CONFIG.into(),
            resources_dir: paths::RESOURCES_DIR.into(),
            kernel: paths::KERNEL_IMAGE.into(),
            disk_image: paths::DISK_IMAGE.into(),
            hw_flags: vec![],
            capture: true,
            results_dir: "/home/me/results".into(),
            timestamp: "2020-01-01-00-00-00".into(),
        }
    }
}

/// The current local time, formatted for use in file names.
pub fn timestamp_now() -> String {
    chrono::offset::Local::now()
        .format("%Y-%m-%d-%H-%M-%S")
        .to_string()
}

/// Given an array of timings, generate a human-readable string.
pub fn timings_str(timings: &[(&str, std::time::Duration)]) -> String {
    let mut s = String::new();
    for (label, d) in timings.iter() {
        s.push_str(&format!("{}: {:?}\n", label, d));
    }
    s
}
