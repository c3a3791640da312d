// Main Entry Point
//
// Command-line surface of the `tsnest` binary: argument parsing and
// dispatch into the build, watch and SDK pipelines.

use crate::config::ProjectConfig;
use crate::logging::{ConsoleLogger, LogLevel, Logger};
use crate::perform_compile::{perform_build, BuildOptions};
use crate::perform_watch::perform_watch;
use crate::sdk::spawn_if_stale;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use ts::CompilerOptions;

fn build_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("project")
            .short('p')
            .long("project")
            .value_name("PATH")
            .help("Path to tsconfig.json (or its directory)"),
    )
    .arg(
        Arg::new("config")
            .long("config")
            .value_name("PATH")
            .help("Path to tsnest.config.json"),
    )
    .arg(
        Arg::new("clean")
            .long("clean")
            .action(ArgAction::SetTrue)
            .help("Delete the output directory before building"),
    )
    .arg(
        Arg::new("no-check")
            .long("no-check")
            .action(ArgAction::SetTrue)
            .help("Skip semantic diagnostics"),
    )
    .arg(
        Arg::new("dump-metadata")
            .long("dump-metadata")
            .action(ArgAction::SetTrue)
            .help("Print the resolved type metadata as JSON"),
    )
    .arg(
        Arg::new("assets")
            .long("assets")
            .value_name("GLOB")
            .action(ArgAction::Append)
            .help("Copy matching non-TypeScript files into the output tree"),
    )
}

fn cli() -> Command {
    // Build flags are accepted both at the top level (`tsnest -p x`) and on
    // the explicit subcommands.
    build_args(
        Command::new("tsnest")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Build driver for decorator-routed TypeScript servers")
            .subcommand_required(false),
    )
    .subcommand(build_args(Command::new("build").about("Compile the project (default)")))
    .subcommand(build_args(
        Command::new("dev").about("Rebuild on file changes"),
    ))
    .subcommand(build_args(
        Command::new("sdk").about("Regenerate the client SDK from the OpenAPI document"),
    ))
    .subcommand(Command::new("migrate").about("Migrate an existing project (external codemod)"))
}

fn build_options(matches: &ArgMatches) -> BuildOptions {
    let project = matches
        .get_one::<String>("project")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tsconfig.json"));
    BuildOptions {
        project,
        config_path: matches.get_one::<String>("config").map(PathBuf::from),
        clean: matches.get_flag("clean"),
        no_check: matches.get_flag("no-check"),
        dump_metadata: matches.get_flag("dump-metadata"),
        assets: matches
            .get_many::<String>("assets")
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default(),
        compiler_overrides: CompilerOptions::default(),
    }
}

/// CLI entry point; returns the process exit code.
pub fn main_fn(args: &[String], shutdown: &AtomicBool) -> i32 {
    let logger = ConsoleLogger::new(LogLevel::Info);
    let matches = match cli().try_get_matches_from(args) {
        Ok(m) => m,
        Err(e) => {
            // clap renders --help/--version through this path too.
            let _ = e.print();
            return if e.use_stderr() { 1 } else { 0 };
        }
    };

    let (name, sub) = match matches.subcommand() {
        Some((name, sub)) => (name, sub.clone()),
        None => ("build", matches.clone()),
    };

    match name {
        "build" | "dev" => {
            let opts = build_options(&sub);
            let Some(host) = ts::registered_host() else {
                logger.error("config: no host compiler registered (is the platform binding installed?)");
                return 1;
            };
            if name == "build" {
                perform_build(&opts, host, &logger)
            } else {
                let project_dir = if opts.project.is_dir() {
                    opts.project.clone()
                } else {
                    opts.project
                        .parent()
                        .unwrap_or(Path::new("."))
                        .to_path_buf()
                };
                match ProjectConfig::discover(&project_dir, opts.config_path.as_deref()) {
                    Ok(loaded) => perform_watch(
                        &opts,
                        &loaded,
                        host,
                        crate::sdk::registered_factory(),
                        shutdown,
                        &logger,
                    ),
                    Err(e) => {
                        logger.error(&format!("config: {}", e));
                        1
                    }
                }
            }
        }
        "sdk" => run_sdk(&build_options(&sub), &logger),
        "migrate" => {
            logger.error("migrate: the migration codemod ships separately and is not installed");
            1
        }
        _ => 1,
    }
}

/// `tsnest sdk`: regenerate from the existing OpenAPI document without a
/// build.
fn run_sdk(opts: &BuildOptions, logger: &dyn Logger) -> i32 {
    let project_dir = if opts.project.is_dir() {
        opts.project.clone()
    } else {
        opts.project
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf()
    };
    let loaded = match ProjectConfig::discover(&project_dir, opts.config_path.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            logger.error(&format!("config: {}", e));
            return 1;
        }
    };
    let (Some(doc), Some(out)) = (&loaded.config.openapi.output, &loaded.config.sdk.output) else {
        logger.error("sdk: both openapi.output and sdk.output must be configured");
        return 1;
    };
    let Some(generator) = crate::sdk::registered_generator() else {
        logger.error("sdk: no generator linked (install the SDK generator package)");
        return 1;
    };
    match spawn_if_stale(Path::new(doc), Path::new(out), generator, logger) {
        Some(task) => {
            if task.join(logger) {
                0
            } else {
                1
            }
        }
        None => {
            logger.info("sdk: up to date");
            0
        }
    }
}
