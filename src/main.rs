//! This program compiles the MFMA micro-benchmarks and runs them, either on this machine or under
//! gem5 in the simulator container. Which routine is chosen by passing different command line
//! arguments.

fn run() -> Result<(), failure::Error> {
    let matches = clap::App::new("mfma-runner")
        .about(
            "This program compiles the MFMA micro-benchmarks and runs them, either on this \
             machine or under gem5 in the simulator container.",
        )
        .subcommand(mfma_runner::mfma::cli_options())
        .subcommand(mfma_runner::build_image::cli_options())
        .subcommand(mfma_runner::list::cli_options())
        .setting(clap::AppSettings::SubcommandRequiredElseHelp)
        .setting(clap::AppSettings::DisableVersion)
        .get_matches();

    match matches.subcommand() {
        ("mfma", Some(sub_m)) => mfma_runner::mfma::run(sub_m),
        ("build_image", Some(sub_m)) => mfma_runner::build_image::run(sub_m),
        ("list", Some(sub_m)) => mfma_runner::list::run(sub_m),

        _ => {
            unreachable!();
        }
    }
}

fn main() {
    use console::style;
    use mfma_runner::RunnerError;

    env_logger::init();

    // Set the RUST_BACKTRACE environment variable so that we always get backtraces. Normally, one
    // doesn't want this because of the performance penalty, but in this case, we don't care too
    // much, whereas the debugging improve is massive.
    std::env::set_var("RUST_BACKTRACE", "1");

    // If an error occurred, try to print something helpful.
    if let Err(err) = run() {
        const MESSAGE: &str = r#"== ERROR ==================================================================================
`mfma-runner` encountered an error. The command log above may offer clues. More detail is
available by setting the RUST_LOG=debug environment variable. Passing --capture makes each
command's output appear right under the command that produced it.
"#;

        println!("{}", style(MESSAGE).red().bold());

        match err.downcast_ref::<RunnerError>() {
            Some(RunnerError::LaunchFailure { .. }) => {
                println!("A program could not be started. Is it installed and on the PATH?")
            }
            Some(RunnerError::BuildFailure { .. }) => {
                println!("The image or the benchmarks failed to build; nothing was run.")
            }
            Some(RunnerError::OutsideMount { .. }) => {
                println!("A command asked for a directory the container cannot see.")
            }
            _ => {}
        }

        // Print error and backtrace
        println!(
            "`mfma-runner` encountered the following error:\n{}\n{}",
            err.as_fail(),
            err.backtrace(),
        );

        std::process::exit(101);
    }
}
