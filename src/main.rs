use clap::Parser;
use hedgegate::cli::{self, Cli, Commands};
use hedgegate::config::AppConfig;
use hedgegate::coordination::{install_signal_handlers, StopHandle};
use hedgegate::error::{HedgeError, Result};
use hedgegate::services::{SignalLog, StatusWriter};
use hedgegate::strategy::ExecutionOrchestrator;
use tracing::{error, info};

mod main_runtime;

use main_runtime::{build_paper_venues, init_logging, init_logging_simple};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config_dir)?;

    match cli.command() {
        Commands::CheckConfig => {
            init_logging_simple();
            print!("{}", cli::render_config(&config));
            match config.validate() {
                Ok(()) => println!("\nConfiguration OK"),
                Err(errors) => {
                    println!("\nConfiguration invalid:");
                    for e in &errors {
                        println!("  - {}", e);
                    }
                    return Err(HedgeError::Validation(errors.join("; ")));
                }
            }
        }
        Commands::Status { path } => {
            init_logging_simple();
            let path = path.unwrap_or_else(|| config.engine.status_path.clone());
            let status = StatusWriter::read(&path).await?;
            print!("{}", cli::render_status(&status));
        }
        Commands::Run { once } => {
            init_logging(&config.logging);
            run_engine(&config, once).await?;
        }
    }

    Ok(())
}

async fn run_engine(config: &AppConfig, once: bool) -> Result<()> {
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("config: {}", e);
        }
        return Err(HedgeError::Validation(errors.join("; ")));
    }

    if !config.engine.dry_run {
        return Err(HedgeError::Validation(
            "live trading needs an external ExecutionClient; set engine.dry_run = true".to_string(),
        ));
    }

    let (execution, reference) = build_paper_venues(config).await;
    let mut orchestrator =
        ExecutionOrchestrator::new(config, execution.clone(), execution.clone())
            .with_signal_log(SignalLog::new(&config.engine.signal_log_path))
            .with_status_writer(StatusWriter::new(&config.engine.status_path));
    if let Some(reference) = reference {
        orchestrator = orchestrator.with_reference_feed(reference);
    }

    if once {
        let report = orchestrator.run_cycle().await?;
        info!(?report, "single cycle finished");
        return Ok(());
    }

    let stop = StopHandle::new();
    install_signal_handlers(stop.clone());
    orchestrator.run(stop).await?;

    let summary = orchestrator.gate().daily_summary();
    let cash = execution.cash().await;
    info!(
        date = %summary.date,
        pnl = %summary.pnl.round_dp(2),
        trades = summary.trades,
        status = %summary.status,
        %cash,
        "engine stopped"
    );
    Ok(())
}
