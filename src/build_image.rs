//! Build the simulator image and do nothing else.

use clap::clap_app;

use crate::{cli, pipeline::Pipeline, shell::HostShell};

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { build_image =>
        (about: "Build the simulator image from its Dockerfile.")
        (@setting DisableVersion)
        (@arg CAPTURE: --capture
         "Capture the output of the build and print it once the build is done.")
    };

    cli::add_env_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let cfg = cli::parse_cli_options(sub_m)?;

    // The image build never goes through the container, whatever the mode.
    let host = HostShell::new();
    Pipeline::new(&cfg, &host, &host).build_image()?;

    Ok(())
}
