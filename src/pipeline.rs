//! The end-to-end run: build the simulator image (isolated mode only), compile the benchmarks,
//! find them, and run each one, collecting its gem5 stats.
//!
//! Failing to build the image or the benchmarks stops everything. A benchmark that fails or
//! leaves no stats behind is recorded and the remaining benchmarks still run.

use std::path::{Path, PathBuf};

use console::style;

use crate::{
    bench::{self, Benchmark},
    dispatch::Environment,
    error::RunnerError,
    gem5::{self, Gem5Config},
    shell::{Cmd, Execute, RunOutput},
    Config, Mode,
};

/// What happened when one benchmark ran.
#[derive(Debug)]
pub struct BenchRun {
    pub bench: Benchmark,
    /// The output of the run, or why it could not be run or did not succeed.
    pub result: Result<RunOutput, RunnerError>,
    /// Where the stats went. `None` in native mode, and when the run failed to launch.
    pub artifact: Option<Result<PathBuf, RunnerError>>,
}

impl BenchRun {
    /// Returns true if the benchmark ran successfully and (in isolated mode) its stats were
    /// collected.
    pub fn ok(&self) -> bool {
        self.result.is_ok()
            && match &self.artifact {
                None | Some(Ok(_)) => true,
                Some(Err(_)) => false,
            }
    }
}

/// The benchmarks run by one pipeline.
#[derive(Debug, Default)]
pub struct Summary {
    pub runs: Vec<BenchRun>,
}

impl Summary {
    pub fn failures(&self) -> usize {
        self.runs.iter().filter(|run| !run.ok()).count()
    }

    pub fn print(&self) {
        println!("{}", style("== SUMMARY ==").bold());
        for run in self.runs.iter() {
            let status = match (&run.result, &run.artifact) {
                (Err(err), _) => style(format!("FAILED: {}", err)).red(),
                (Ok(_), Some(Err(err))) => style(format!("NO STATS: {}", err)).red(),
                (Ok(_), Some(Ok(path))) => style(format!("ok -> {}", path.display())).green(),
                (Ok(_), None) => style("ok".to_owned()).green(),
            };
            println!("{}: {}", run.bench.name, status);
        }
        println!(
            "{} benchmark(s), {} failure(s)",
            self.runs.len(),
            self.failures()
        );
    }
}

/// Runs the stages of the pipeline.
///
/// `host` runs commands on this machine; `shell` runs commands wherever the configured mode
/// says (see `crate::dispatch::dispatcher`).
pub struct Pipeline<'a> {
    cfg: &'a Config,
    host: &'a dyn Execute,
    shell: &'a dyn Execute,
}

impl<'a> Pipeline<'a> {
    pub fn new(cfg: &'a Config, host: &'a dyn Execute, shell: &'a dyn Execute) -> Self {
        Pipeline { cfg, host, shell }
    }

    /// `cmd`, run from the benchmark tree. In isolated mode this is the container's workdir.
    fn in_host_dir(&self, cmd: Cmd) -> Cmd {
        cmd.cwd(self.cfg.host_dir.as_str())
    }

    /// Run `cmd` on `shell`, print any captured output, and turn an unsuccessful exit into a
    /// `BuildFailure` for `step`.
    fn build_step(&self, shell: &dyn Execute, step: &str, cmd: Cmd) -> Result<(), RunnerError> {
        let out = shell.run(&self.in_host_dir(cmd).capture(self.cfg.capture))?;
        out.print();

        if out.success() {
            Ok(())
        } else {
            Err(RunnerError::BuildFailure {
                step: step.to_owned(),
                status: out.exit_status(),
            })
        }
    }

    /// Build the simulator image. This always runs on the host, since it creates the
    /// environment everything else runs in.
    pub fn build_image(&self) -> Result<(), RunnerError> {
        self.build_step(
            self.host,
            "image build",
            cmd!(
                &self.cfg.runtime,
                "build",
                "-t",
                &self.cfg.image,
                &self.cfg.dockerfile_dir
            ),
        )
    }

    /// Rebuild all benchmarks.
    pub fn compile(&self) -> Result<(), RunnerError> {
        self.build_step(
            self.shell,
            "compile",
            cmd!(&self.cfg.make, "all", "-j", "-B", "-C", &self.cfg.bench_dir),
        )
    }

    /// The benchmarks that the last compile produced, looked up on the host.
    pub fn discover(&self) -> Result<Vec<Benchmark>, failure::Error> {
        bench::discover(&self.cfg.host_dir, &self.cfg.bench_dir)
    }

    /// The host directory the simulator runs in, i.e. where its stats show up. `None` in
    /// native mode.
    pub fn sim_run_dir(&self) -> Option<PathBuf> {
        match self.cfg.mode {
            Mode::Native => None,
            Mode::Isolated => {
                let env = Environment::from_config(self.cfg);
                env.host_path(&env.workdir)
            }
        }
    }

    /// The command that runs `bench`.
    pub fn bench_cmd(&self, bench: &Benchmark) -> Cmd {
        let cmd = match self.cfg.mode {
            Mode::Native => Cmd::new(&bench.binary),
            Mode::Isolated => gem5::gem5_cmd(&Gem5Config {
                gem5: &self.cfg.gem5,
                config_script: &self.cfg.gem5_config,
                hw_flags: &self.cfg.hw_flags,
                app: &bench.binary,
                kernel: &dir!(&self.cfg.resources_dir, &self.cfg.kernel),
                disk_image: &dir!(&self.cfg.resources_dir, &self.cfg.disk_image),
            }),
        };

        self.in_host_dir(cmd).capture(self.cfg.capture)
    }

    /// Run one benchmark and collect its stats.
    pub fn run_one(&self, bench: &Benchmark) -> BenchRun {
        println!("{}", style(format!("running {}:", bench.name)).bold());

        let stats = self.sim_run_dir().map(gem5::stats_file);

        // Only one stats file may be unclaimed at a time.
        if let Some(stats) = &stats {
            if let Err(err) = bench::clear_stale_artifact(stats) {
                log::error!("unable to remove {}: {}", stats.display(), err);
            }
        }

        let result = match self.shell.run(&self.bench_cmd(bench)) {
            Ok(out) => {
                out.print();
                if out.success() {
                    Ok(out)
                } else {
                    Err(RunnerError::RunFailure {
                        bench: bench.name.clone(),
                        status: out.exit_status(),
                    })
                }
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            println!("{}", style(format!("{}", err)).red());
        }

        // A run that never started has nothing to collect. A failed run may still have written
        // stats.
        let launched = !matches!(&result, Err(err) if err.never_ran());

        let artifact = match stats {
            Some(stats) if launched => {
                let claimed =
                    bench::claim_artifact(&stats, &bench.name, Path::new(&self.cfg.results_dir));
                if let Err(err) = &claimed {
                    println!("{}", style(format!("{}", err)).red());
                }
                Some(claimed)
            }
            Some(stats) => {
                if let Err(err) = bench::clear_stale_artifact(&stats) {
                    log::error!("unable to remove {}: {}", stats.display(), err);
                }
                None
            }
            None => None,
        };

        BenchRun {
            bench: bench.clone(),
            result,
            artifact,
        }
    }

    /// Run every benchmark in order, regardless of how the others went.
    pub fn run_each(&self, benches: &[Benchmark]) -> Summary {
        Summary {
            runs: benches.iter().map(|bench| self.run_one(bench)).collect(),
        }
    }

    /// Run all stages, recording how long each took in `timers`.
    pub fn run(
        &self,
        timers: &mut Vec<(&'static str, std::time::Duration)>,
    ) -> Result<Summary, failure::Error> {
        if self.cfg.mode == Mode::Isolated {
            time!(timers, "Build image", self.build_image()?);
        }

        time!(timers, "Compile", self.compile()?);

        let benches = self.discover()?;
        log::info!(
            "found {} benchmark(s): {:?}",
            benches.len(),
            benches.iter().map(|b| b.name.as_str()).collect::<Vec<_>>()
        );

        Ok(time!(timers, "Run benchmarks", self.run_each(&benches)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::fs;

    use crate::shell::MockExecute;

    fn exited(status: i32) -> Result<RunOutput, RunnerError> {
        Ok(RunOutput {
            status: Some(status),
            ..RunOutput::default()
        })
    }

    fn benches(names: &[&str]) -> Vec<Benchmark> {
        names
            .iter()
            .map(|name| Benchmark::new("matrix-cores", name))
            .collect()
    }

    /// A shell that records every command and answers with the next of the given exit codes.
    struct Recorder {
        seen: RefCell<Vec<Cmd>>,
        statuses: RefCell<Vec<i32>>,
    }

    impl Recorder {
        fn new(statuses: &[i32]) -> Self {
            Recorder {
                seen: RefCell::new(vec![]),
                statuses: RefCell::new(statuses.iter().rev().cloned().collect()),
            }
        }
    }

    impl Execute for Recorder {
        fn run(&self, cmd: &Cmd) -> Result<RunOutput, RunnerError> {
            self.seen.borrow_mut().push(cmd.clone());
            exited(self.statuses.borrow_mut().pop().unwrap_or(0))
        }
    }

    #[test]
    fn continues_after_run_failure() {
        let cfg = Config::for_tests();
        let host = MockExecute::new();
        let shell = Recorder::new(&[0, 1, 0]);
        let pipeline = Pipeline::new(&cfg, &host, &shell);

        let summary = pipeline.run_each(&benches(&["a", "b", "c"]));

        assert_eq!(shell.seen.borrow().len(), 3);
        assert_eq!(summary.runs.len(), 3);
        assert!(summary.runs[0].ok());
        assert!(matches!(
            summary.runs[1].result,
            Err(RunnerError::RunFailure { ref bench, .. }) if bench == "b"
        ));
        assert!(summary.runs[2].ok());
        assert_eq!(summary.failures(), 1);
    }

    #[test]
    fn continues_after_launch_failure() {
        let cfg = Config::for_tests();
        let host = MockExecute::new();
        let mut shell = MockExecute::new();
        let mut calls = 0;
        shell.expect_run().times(2).returning(move |cmd| {
            calls += 1;
            if calls == 1 {
                Err(RunnerError::LaunchFailure {
                    cmd: cmd.to_shell_string(),
                    cause: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
            } else {
                exited(0)
            }
        });
        let pipeline = Pipeline::new(&cfg, &host, &shell);

        let summary = pipeline.run_each(&benches(&["a", "b"]));
        assert!(!summary.runs[0].ok());
        assert!(summary.runs[1].ok());
    }

    #[test]
    fn native_bench_runs_binary_without_args() {
        let cfg = Config::for_tests();
        let host = MockExecute::new();
        let shell = MockExecute::new();
        let pipeline = Pipeline::new(&cfg, &host, &shell);

        let cmd = pipeline.bench_cmd(&Benchmark::new("matrix-cores", "gemm"));
        assert_eq!(cmd.argv(), &["matrix-cores/gemm"]);
        assert_eq!(cmd.get_cwd(), Some("/home/me/mfma"));
        assert!(cmd.is_captured());
        assert_eq!(pipeline.sim_run_dir(), None);
    }

    #[test]
    fn isolated_bench_runs_gem5() {
        let mut cfg = Config::for_tests();
        cfg.mode = Mode::Isolated;
        cfg.hw_flags = vec!["--num-compute-units".into(), "4".into()];
        let host = MockExecute::new();
        let shell = MockExecute::new();
        let pipeline = Pipeline::new(&cfg, &host, &shell);

        let cmd = pipeline.bench_cmd(&Benchmark::new("matrix-cores", "gemm"));
        assert_eq!(
            cmd.argv(),
            &[
                "gem5/build/VEGA_X86/gem5.opt",
                "gem5/configs/example/gpufs/mi200.py",
                "--num-compute-units",
                "4",
                "-a",
                "matrix-cores/gemm",
                "--kernel",
                "gem5-resources/vmlinux-gpu-ml",
                "--disk-image",
                "gem5-resources/x86-ubuntu-gpu-ml",
            ]
        );
        assert_eq!(pipeline.sim_run_dir(), Some(PathBuf::from("/home/me/mfma")));
    }

    #[test]
    fn compile_failure_is_build_failure() {
        let cfg = Config::for_tests();
        let host = MockExecute::new();
        let mut shell = MockExecute::new();
        shell
            .expect_run()
            .withf(|cmd: &Cmd| {
                cmd.argv() == &["make", "all", "-j", "-B", "-C", "matrix-cores"]
                    && cmd.get_cwd() == Some("/home/me/mfma")
            })
            .times(1)
            .returning(|_| exited(2));
        let pipeline = Pipeline::new(&cfg, &host, &shell);

        match pipeline.compile() {
            Err(RunnerError::BuildFailure { step, status }) => {
                assert_eq!(step, "compile");
                assert_eq!(status.0, Some(2));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn image_build_runs_on_host() {
        let cfg = Config::for_tests();
        let mut host = MockExecute::new();
        host.expect_run()
            .withf(|cmd: &Cmd| {
                cmd.argv() == &["docker", "build", "-t", "mi200-container", "docker"]
                    && cmd.get_cwd() == Some("/home/me/mfma")
            })
            .times(1)
            .returning(|_| exited(0));
        let mut shell = MockExecute::new();
        shell.expect_run().times(0);
        let pipeline = Pipeline::new(&cfg, &host, &shell);

        pipeline.build_image().unwrap();
    }

    #[test]
    fn isolated_build_failure_stops_pipeline() {
        let mut cfg = Config::for_tests();
        cfg.mode = Mode::Isolated;
        let mut host = MockExecute::new();
        host.expect_run().times(1).returning(|_| exited(1));
        let mut shell = MockExecute::new();
        shell.expect_run().times(0);
        let pipeline = Pipeline::new(&cfg, &host, &shell);

        let mut timers = vec![];
        let err = pipeline.run(&mut timers).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunnerError>(),
            Some(RunnerError::BuildFailure { .. })
        ));
    }

    #[test]
    fn compile_failure_stops_pipeline() {
        let cfg = Config::for_tests();
        let host = MockExecute::new();
        let mut shell = MockExecute::new();
        shell.expect_run().times(1).returning(|_| exited(2));
        let pipeline = Pipeline::new(&cfg, &host, &shell);

        let mut timers = vec![];
        assert!(pipeline.run(&mut timers).is_err());
    }

    #[test]
    fn isolated_run_collects_stats() {
        let tmp = tempfile::tempdir().unwrap();
        let host_dir = tmp.path().join("host");
        let results = tmp.path().join("results");
        fs::create_dir_all(host_dir.join("m5out")).unwrap();
        fs::create_dir_all(&results).unwrap();

        let mut cfg = Config::for_tests();
        cfg.mode = Mode::Isolated;
        cfg.host_dir = host_dir.to_str().unwrap().to_owned();
        cfg.results_dir = results.to_str().unwrap().to_owned();

        // A stale stats file from some earlier run must not be credited to `a`.
        let stats = host_dir.join("m5out").join("stats.txt");
        fs::write(&stats, b"stale").unwrap();

        // `a` writes stats, `b` fails without writing any.
        let host = MockExecute::new();
        let mut shell = MockExecute::new();
        let stats_for_shell = stats.clone();
        shell.expect_run().times(2).returning(move |cmd| {
            if cmd.argv().iter().any(|a| a == "matrix-cores/a") {
                fs::write(&stats_for_shell, b"a stats").unwrap();
                exited(0)
            } else {
                exited(1)
            }
        });
        let pipeline = Pipeline::new(&cfg, &host, &shell);

        let summary = pipeline.run_each(&benches(&["a", "b"]));

        let a = &summary.runs[0];
        assert!(a.ok());
        let a_stats = results.join("a_stats.txt");
        assert_eq!(a.artifact.as_ref().unwrap().as_ref().unwrap(), &a_stats);
        assert_eq!(fs::read(&a_stats).unwrap(), b"a stats");

        let b = &summary.runs[1];
        assert!(matches!(b.result, Err(RunnerError::RunFailure { .. })));
        assert!(matches!(
            b.artifact,
            Some(Err(RunnerError::ArtifactMissing { .. }))
        ));

        assert!(!stats.exists());
    }

    #[test]
    fn launch_failure_clears_leftover_stats() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("m5out")).unwrap();

        let mut cfg = Config::for_tests();
        cfg.mode = Mode::Isolated;
        cfg.host_dir = tmp.path().to_str().unwrap().to_owned();
        cfg.results_dir = tmp.path().join("results").to_str().unwrap().to_owned();

        let stats = tmp.path().join("m5out").join("stats.txt");
        let host = MockExecute::new();
        let mut shell = MockExecute::new();
        let stats_for_shell = stats.clone();
        shell.expect_run().times(1).returning(move |cmd| {
            // Something else left a file behind while the launch was failing.
            fs::write(&stats_for_shell, b"not ours").unwrap();
            Err(RunnerError::LaunchFailure {
                cmd: cmd.to_shell_string(),
                cause: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        });
        let pipeline = Pipeline::new(&cfg, &host, &shell);

        let run = pipeline.run_one(&Benchmark::new("matrix-cores", "a"));

        assert!(matches!(run.result, Err(RunnerError::LaunchFailure { .. })));
        assert!(run.artifact.is_none());
        assert!(!stats.exists());
    }
}
