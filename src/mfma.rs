//! Compile the MFMA micro-benchmarks and run each of them, either natively or under gem5 in the
//! simulator container. In the container, the gem5 stats of each benchmark are collected as
//! `<benchmark>_stats.txt` in the results directory.
//!
//! Requires the simulator image's `Dockerfile`, gem5, and the gem5 resources to be in the host
//! directory (unless `--native` is passed).

use clap::clap_app;

use failure::ResultExt;

use crate::{
    cli,
    dispatch::dispatcher,
    pipeline::Pipeline,
    shell::HostShell,
    timings_str,
};

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { mfma =>
        (about: "Compile and run the MFMA micro-benchmarks. Unless --native is passed, \
                 everything runs in the simulator container, which is (re)built first.")
        (@setting DisableVersion)
    };

    cli::add_run_options(cli::add_env_options(cli::add_bench_options(app)))
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let cfg = cli::parse_cli_options(sub_m)?;

    std::fs::create_dir_all(&cfg.results_dir)
        .with_context(|_| format!("creating results directory {}", cfg.results_dir))?;

    // Record the parameters before doing anything, so that aborted runs are recorded too.
    let (params_file, time_file) = cfg.gen_standard_names();
    let params = serde_json::to_string(&cfg)?;
    std::fs::write(dir!(&cfg.results_dir, &params_file), params)?;

    let host = HostShell::new();
    let shell = dispatcher(&cfg, &host);
    let pipeline = Pipeline::new(&cfg, &host, &*shell);

    let mut timers = vec![];
    let summary = pipeline.run(&mut timers)?;

    summary.print();

    std::fs::write(
        dir!(&cfg.results_dir, &time_file),
        timings_str(timers.as_slice()),
    )?;

    println!("RESULTS: {}", cfg.results_dir);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::Mode;

    #[test]
    fn accepts_every_option_group() {
        let m = cli_options()
            .get_matches_from_safe(vec![
                "mfma",
                "--native",
                "--host_dir",
                "/tmp",
                "--image",
                "my-image",
                "--sim_flags",
                "--num-compute-units 4",
            ])
            .unwrap();
        let cfg = cli::parse_cli_options(&m).unwrap();

        assert_eq!(cfg.mode, Mode::Native);
        assert_eq!(cfg.image, "my-image");
        assert_eq!(cfg.hw_flags, vec!["--num-compute-units", "4"]);
    }
}
