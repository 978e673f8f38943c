//! Process startup: arguments, configuration, logging and the pipeline run

use crate::app::args::Args;
use crate::app::config::AppConfig;
use crate::app::display::render_statistics;
use crate::app::error::{AppError, AppResult};
use crate::app::pipeline::{run_pipeline, PipelineReport};
use crate::core::error_handling::{fatal_message, log_error_with_context};
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use clap::Parser;
use std::io::IsTerminal;
use tokio::io::BufReader;

/// Run the application, returning the process exit status
pub async fn startup() -> i32 {
    let args = Args::parse();

    // Logging is not available until the configuration is known
    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", fatal_message(&e, "Loading configuration"));
            return 1;
        }
    };

    let use_color = config
        .logging
        .color
        .unwrap_or_else(|| std::io::stderr().is_terminal());
    if let Err(e) = init_logging(
        config.logging.level.as_deref(),
        config.logging.format.as_deref(),
        config.logging.file.as_deref(),
        use_color,
    )
    .map_err(|e| AppError::Logging {
        message: e.to_string(),
    }) {
        eprintln!("{}", fatal_message(&e, "Initialising logging"));
        return 1;
    }

    log::info!(
        "outflow {} starting, delivering to {}",
        env!("CARGO_PKG_VERSION"),
        config.delivery.endpoint
    );
    log::debug!("Configuration: {:?}", config);

    let coordinator = ShutdownCoordinator::new();
    coordinator.install_signal_handlers();

    match run(&config, &coordinator).await {
        Ok(report) if report.drained => 0,
        Ok(_) => 2,
        Err(e) => {
            log_error_with_context(&e, "Running delivery pipeline");
            1
        }
    }
}

async fn load_config(args: &Args) -> AppResult<AppConfig> {
    let mut config = AppConfig::load(args.config_file.as_deref()).await?;
    config.apply_args(args);
    Ok(config)
}

async fn run(config: &AppConfig, coordinator: &ShutdownCoordinator) -> AppResult<PipelineReport> {
    let input = BufReader::new(tokio::io::stdin());
    let report = run_pipeline(input, config, coordinator.token()).await?;

    log::info!(
        "Finished: {} records accepted, {} dropped",
        report.accepted,
        report.dropped
    );
    let rendered = render_statistics(&report.statistics, config.pipeline.stats_format)?;
    println!("{}", rendered);
    Ok(report)
}
