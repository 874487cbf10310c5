//! Invoking the gem5 full-system GPU simulator.

use std::path::{Path, PathBuf};

use crate::shell::Cmd;

/// The directory gem5 writes its output to, relative to the directory it runs in.
pub const GEM5_OUTPUT_DIR: &str = "m5out";

/// The file in `GEM5_OUTPUT_DIR` that we keep from each run.
pub const GEM5_STATS_FILE: &str = "stats.txt";

/// Settings for one run of a benchmark under gem5. All paths are as seen by the simulator, i.e.
/// relative to the directory it runs in or absolute inside the container.
#[derive(Debug)]
pub struct Gem5Config<'s> {
    /// The gem5 binary (e.g. `gem5/build/VEGA_X86/gem5.opt`).
    pub gem5: &'s str,
    /// The python config script describing the simulated system.
    pub config_script: &'s str,
    /// Extra options describing the simulated hardware (CU count, memory timings, register
    /// file sizes...). Passed verbatim, after the config script.
    pub hw_flags: &'s [String],
    /// The benchmark binary to run in the simulated system.
    pub app: &'s str,
    /// The kernel image to boot.
    pub kernel: &'s str,
    /// The disk image to boot.
    pub disk_image: &'s str,
}

/// The command that runs the benchmark described by `cfg` under gem5.
pub fn gem5_cmd(cfg: &Gem5Config<'_>) -> Cmd {
    cmd!(cfg.gem5, cfg.config_script)
        .args(cfg.hw_flags.iter().map(String::as_str))
        .args(vec![
            "-a",
            cfg.app,
            "--kernel",
            cfg.kernel,
            "--disk-image",
            cfg.disk_image,
        ])
}

/// The stats file gem5 leaves behind when it runs in `run_dir`.
pub fn stats_file<P: AsRef<Path>>(run_dir: P) -> PathBuf {
    run_dir
        .as_ref()
        .join(GEM5_OUTPUT_DIR)
        .join(GEM5_STATS_FILE)
}
