use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use mucgly::cli::CliArgs;
use mucgly::config::{Config, INIT_ENV};
use mucgly::process;

fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(a) => a,
        // Prints usage; exit code 2 for bad arguments, 0 for --help.
        Err(e) => e.exit(),
    };

    // ── Logging: warnings by default, debug with -v, RUST_LOG wins ───────────
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let config = match Config::from_args(args, std::env::var_os(INIT_ENV)) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match process::run(&config) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            log::debug!("{} of {} inputs failed", report.failed.len(), report.processed);
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
