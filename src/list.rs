//! Print the benchmarks that would be run, one per line.

use clap::clap_app;

use crate::{bench, cli};

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { list =>
        (about: "List the benchmarks found in the benchmark directory.")
        (@setting DisableVersion)
        (@arg PATHS: --paths "Print the path of each binary instead of its name.")
    };

    cli::add_bench_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let cfg = cli::parse_cli_options(sub_m)?;

    for bench in bench::discover(&cfg.host_dir, &cfg.bench_dir)? {
        if sub_m.is_present("PATHS") {
            println!("{}", bench.binary);
        } else {
            println!("{}", bench.name);
        }
    }

    Ok(())
}
