//! Some routines for adding common CLI options in a consistent, less boilerplatey way.
//!
//! All routines build a `Config` with `parse_cli_options`. Options a routine did not add are
//! simply left at their defaults.

use clap::{App, Arg, ArgMatches};

use failure::ResultExt;

use crate::{paths::*, Config, Mode};

/// Where the benchmarks are.
pub fn add_bench_options<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("HOST_DIR")
            .long("host_dir")
            .takes_value(true)
            .help(
                "The directory containing the benchmarks, gem5, and the gem5 resources. This is \
                 what gets mounted into the container. Defaults to the current directory.",
            ),
    )
    .arg(
        Arg::with_name("BENCH_DIR")
            .long("bench_dir")
            .takes_value(true)
            .default_value(BENCH_DIR)
            .help(
                "The benchmark directory, relative to the host directory. Sources are expected \
                 in its `src/` subdirectory.",
            ),
    )
}

/// How to build and run the simulator container.
pub fn add_env_options<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("RUNTIME")
            .long("runtime")
            .takes_value(true)
            .default_value(CONTAINER_RUNTIME)
            .help("The container runtime to use (e.g. docker or podman)."),
    )
    .arg(
        Arg::with_name("IMAGE")
            .long("image")
            .takes_value(true)
            .default_value(IMAGE_NAME)
            .help("The name of the simulator image."),
    )
    .arg(
        Arg::with_name("DOCKERFILE")
            .long("dockerfile")
            .takes_value(true)
            .default_value(DOCKERFILE_DIR)
            .help("The directory containing the Dockerfile of the simulator image."),
    )
    .arg(
        Arg::with_name("MOUNT")
            .long("mount")
            .takes_value(true)
            .default_value(MOUNT_POINT)
            .validator(validate_absolute)
            .help("Where the host directory is mounted in the container. Commands run there."),
    )
}

/// How to compile and run the benchmarks.
pub fn add_run_options<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("NATIVE")
            .long("native")
            .help("Run everything directly on this machine instead of in the simulator container."),
    )
    .arg(
        Arg::with_name("MAKE")
            .long("make")
            .takes_value(true)
            .default_value(MAKE)
            .help("The build tool used to compile the benchmarks."),
    )
    .arg(
        Arg::with_name("GEM5")
            .long("sim")
            .takes_value(true)
            .default_value(GEM5_BINARY)
            .help("The gem5 binary, as seen in the container."),
    )
    .arg(
        Arg::with_name("GEM5_CONFIG")
            .long("sim_config")
            .takes_value(true)
            .default_value(GEM5_CONFIG)
            .help("The gem5 config script, as seen in the container."),
    )
    .arg(
        Arg::with_name("RESOURCES")
            .long("resources")
            .takes_value(true)
            .default_value(RESOURCES_DIR)
            .help("The directory with the kernel and disk images."),
    )
    .arg(
        Arg::with_name("KERNEL")
            .long("kernel")
            .takes_value(true)
            .default_value(KERNEL_IMAGE)
            .help("The kernel image, in the resources directory."),
    )
    .arg(
        Arg::with_name("DISK_IMAGE")
            .long("disk_image")
            .takes_value(true)
            .default_value(DISK_IMAGE)
            .help("The disk image, in the resources directory."),
    )
    .arg(
        Arg::with_name("HW_FLAGS")
            .long("sim_flags")
            .takes_value(true)
            .allow_hyphen_values(true)
            .help(
                "Space separated options describing the simulated hardware, passed to the gem5 \
                 config script verbatim (e.g. \"--num-compute-units 8 --reg-alloc-policy dynamic\").",
            ),
    )
    .arg(
        Arg::with_name("CAPTURE")
            .long("capture")
            .help("Capture the output of each command and print it once the command is done."),
    )
    .arg(
        Arg::with_name("RESULTS")
            .long("results")
            .takes_value(true)
            .default_value(RESULTS_DIR)
            .help("Where to put the collected gem5 stats and the records of the run."),
    )
}

fn validate_absolute(path: String) -> Result<(), String> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(format!("{} is not an absolute path", path))
    }
}

/// Parse the values added by the `add_*_options` functions.
pub fn parse_cli_options(sub_m: &ArgMatches<'_>) -> Result<Config, failure::Error> {
    let value = |name: &str, default: &str| sub_m.value_of(name).unwrap_or(default).to_owned();

    let host_dir = match sub_m.value_of("HOST_DIR") {
        Some(dir) => std::path::PathBuf::from(dir),
        None => std::env::current_dir().context("getting the current directory")?,
    };
    let host_dir = host_dir
        .canonicalize()
        .with_context(|_| format!("resolving host directory {}", host_dir.display()))?;
    let host_dir = match host_dir.to_str() {
        Some(dir) => dir.to_owned(),
        None => failure::bail!("host directory {} is not UTF-8", host_dir.display()),
    };

    let hw_flags = sub_m
        .value_of("HW_FLAGS")
        .map(|flags| flags.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_else(Vec::new);

    Ok(Config {
        mode: if sub_m.is_present("NATIVE") {
            Mode::Native
        } else {
            Mode::Isolated
        },

        image: value("IMAGE", IMAGE_NAME),
        dockerfile_dir: value("DOCKERFILE", DOCKERFILE_DIR),
        runtime: value("RUNTIME", CONTAINER_RUNTIME),
        host_dir,
        mount_point: value("MOUNT", MOUNT_POINT),

        bench_dir: value("BENCH_DIR", BENCH_DIR),
        make: value("MAKE", MAKE),

        gem5: value("GEM5", GEM5_BINARY),
        gem5_config: value("GEM5_CONFIG", GEM5_CONFIG),
        resources_dir: value("RESOURCES", RESOURCES_DIR),
        kernel: value("KERNEL", KERNEL_IMAGE),
        disk_image: value("DISK_IMAGE", DISK_IMAGE),
        hw_flags,

        capture: sub_m.is_present("CAPTURE"),
        results_dir: value("RESULTS", RESULTS_DIR),

        timestamp: crate::timestamp_now(),
    })
}
