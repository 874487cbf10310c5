//! Finding the compiled benchmarks and collecting what the simulator leaves behind.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use failure::ResultExt;

use crate::error::RunnerError;

/// Extensions of the files in the benchmark `src/` directory that each produce one benchmark
/// binary.
pub const SOURCE_EXTENSIONS: &[&str] = &["cpp", "cc", "cxx", "hip"];

/// One benchmark binary produced by the build.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Benchmark {
    /// The name of the benchmark, which is also the name of its source file without the
    /// extension.
    pub name: String,
    /// Path of the binary, relative to the directory commands run in.
    pub binary: String,
}

impl Benchmark {
    pub fn new(bench_dir: &str, name: &str) -> Self {
        Benchmark {
            name: name.to_owned(),
            binary: dir!(bench_dir, name),
        }
    }
}

/// The benchmark names for the sources in `src_dir`, sorted and without duplicates (e.g.
/// `gemm.cpp` and `gemm.hip` are one benchmark).
pub fn benchmark_names<P: AsRef<Path>>(src_dir: P) -> Result<Vec<String>, failure::Error> {
    let src_dir = src_dir.as_ref();
    let entries = std::fs::read_dir(src_dir)
        .with_context(|_| format!("listing benchmark sources in {}", src_dir.display()))?;

    let mut names = BTreeSet::new();
    for entry in entries {
        let path = entry?.path();

        let is_source = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SOURCE_EXTENSIONS.contains(&ext))
            .unwrap_or(false);
        if !is_source || path.is_dir() {
            continue;
        }

        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            names.insert(stem.to_owned());
        } else {
            log::warn!("skipping source with non-UTF-8 name: {}", path.display());
        }
    }

    Ok(names.into_iter().collect())
}

/// Discover the benchmarks of the benchmark directory `bench_dir`, which is relative to
/// `root` on this machine. Sources are in `<bench_dir>/src` and binaries are built into
/// `<bench_dir>`.
pub fn discover(root: &str, bench_dir: &str) -> Result<Vec<Benchmark>, failure::Error> {
    let src_dir = Path::new(root).join(bench_dir).join("src");

    Ok(benchmark_names(src_dir)?
        .iter()
        .map(|name| Benchmark::new(bench_dir, name))
        .collect())
}

/// Where a claimed artifact goes: `<dest_dir>/<bench>_<artifact file name>`.
pub fn claimed_path(artifact: &Path, bench: &str, dest_dir: &Path) -> PathBuf {
    let suffix = artifact
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest_dir.join(format!("{}_{}", bench, suffix))
}

/// Move the artifact left by the run of `bench` to the results directory, renaming it after the
/// benchmark. Afterwards, nothing is left at `artifact`.
pub fn claim_artifact(artifact: &Path, bench: &str, dest_dir: &Path) -> Result<PathBuf, RunnerError> {
    if !artifact.is_file() {
        return Err(RunnerError::ArtifactMissing {
            bench: bench.to_owned(),
            path: artifact.display().to_string(),
        });
    }

    let dest = claimed_path(artifact, bench, dest_dir);
    let relocate_err = |cause| RunnerError::Relocate {
        from: artifact.display().to_string(),
        to: dest.display().to_string(),
        cause,
    };

    // `rename` fails across filesystems (e.g. a bind mount vs. the results dir), so fall back to
    // copying.
    if let Err(err) = std::fs::rename(artifact, &dest) {
        log::debug!("rename failed ({}), copying instead", err);
        std::fs::copy(artifact, &dest).map_err(relocate_err)?;
        std::fs::remove_file(artifact).map_err(relocate_err)?;
    }

    Ok(dest)
}

/// Remove an artifact nobody claimed, so that it cannot be attributed to the next benchmark.
/// Returns true if there was one.
pub fn clear_stale_artifact(artifact: &Path) -> std::io::Result<bool> {
    if artifact.is_file() {
        log::warn!("removing unclaimed artifact {}", artifact.display());
        std::fs::remove_file(artifact)?;
        Ok(true)
    } else {
        Ok(false)
    }
}
