use anyhow::Result;
use clap::{CommandFactory, FromArgMatches};

use memc_load::cli::{Cli, StatsFormat};
use memc_load::config::LoaderConfig;
use memc_load::config_file::ConfigFile;
use memc_load::{codec, Coordinator, RunStats};

mod logging;
mod platform;

use platform::ExitCode;

fn main() -> Result<()> {
    let cli = process_args_with_config();

    if let Err(e) = logging::init(cli.effective_log_level(), cli.log.as_deref()) {
        eprintln!("memc-load: Error: {:#}", e);
        ExitCode::GeneralError.exit();
    }

    if cli.test {
        match codec::self_test() {
            Ok(()) => {
                tracing::info!("self-test passed");
                ExitCode::Success.exit();
            }
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "self-test failed");
                ExitCode::GeneralError.exit();
            }
        }
    }

    let config = match LoaderConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            eprintln!("memc-load: Error: {}", e);
            ExitCode::InvalidUsage.exit();
        }
    };

    tracing::info!(
        pattern = %config.input.pattern,
        workers = config.effective_workers(),
        queue_capacity = config.pipeline.queue_capacity,
        dry_run = config.dry_run,
        timeout = ?config.timeout,
        destinations = ?config.destinations.iter().collect::<Vec<_>>(),
        "memc-load started"
    );

    let mut coordinator = Coordinator::new(config);
    let stats = match coordinator.run() {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "run aborted");
            eprintln!("memc-load: Error: {:#}", e);
            ExitCode::GeneralError.exit();
        }
    };

    if !cli.quiet {
        print_summary(&stats, &cli.stats_format)?;
    }

    ExitCode::from(stats.verdict()).exit()
}

fn print_summary(stats: &RunStats, format: &StatsFormat) -> Result<()> {
    match format {
        StatsFormat::Table => println!("{}", stats.format_stats()),
        StatsFormat::Json => println!("{}", stats.to_json()?),
    }
    Ok(())
}

/// Parse the command line with config file defaults applied in front
fn process_args_with_config() -> Cli {
    let raw_args: Vec<String> = std::env::args().collect();

    if raw_args.iter().any(|arg| arg == "--show-config") {
        ConfigFile::show_config();
        ExitCode::Success.exit();
    }

    let processed_args = if raw_args.iter().any(|arg| arg == "--ignore-config") {
        raw_args
    } else {
        let config_file_path = extract_config_file_arg(&raw_args);
        match ConfigFile::load_with_custom_path(config_file_path.as_deref())
            .and_then(|config_file| config_file.process_args(raw_args))
        {
            Ok(processed) => processed,
            Err(e) => {
                eprintln!("memc-load: Config file error: {:#}", e);
                ExitCode::InvalidUsage.exit();
            }
        }
    };

    // clap exits with status 2 on usage errors
    let matches = Cli::command().get_matches_from(processed_args);
    Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn extract_config_file_arg(args: &[String]) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config-file" {
            return iter.next().cloned();
        }
        if let Some(path) = arg.strip_prefix("--config-file=") {
            return Some(path.to_string());
        }
    }
    None
}
