use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::services::StatusSnapshot;

#[derive(Parser, Debug)]
#[command(name = "hedgegate")]
#[command(version)]
#[command(about = "Risk-gated prediction market trading engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding default.toml and per-environment overrides
    #[arg(short, long, default_value = "config", env = "HEDGEGATE_CONFIG_DIR")]
    pub config_dir: PathBuf,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the poll / gate / execute loop against the paper venue
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Load and validate configuration without trading
    CheckConfig,
    /// Print the last status snapshot written by a running engine
    Status {
        /// Snapshot path (defaults to engine.status_path)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

impl Cli {
    /// `run` when no subcommand is given
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run { once: false })
    }
}

/// Human-readable configuration summary for `check-config`
pub fn render_config(config: &AppConfig) -> String {
    let t = &config.trading;
    let e = &config.engine;
    let mut out = String::new();

    out.push_str("Trading\n");
    out.push_str(&format!(
        "  trade amount      ${} - ${}\n",
        t.min_trade_amount, t.max_trade_amount
    ));
    out.push_str(&format!("  max daily loss    ${}\n", t.max_daily_loss));
    out.push_str(&format!("  daily trades      {}\n", t.daily_trade_limit));
    out.push_str(&format!("  open positions    {}\n", t.max_open_positions));
    out.push_str(&format!("  exposure ceiling  ${}\n", t.max_single_position));
    out.push_str(&format!("  arb threshold     {}\n", t.arb_threshold));
    out.push_str(&format!(
        "  stop / take       {} / {}\n",
        t.stop_loss_percent, t.take_profit_percent
    ));

    out.push_str("Engine\n");
    out.push_str(&format!("  poll interval     {}s\n", e.poll_interval_secs));
    out.push_str(&format!("  request timeout   {}ms\n", e.request_timeout_ms));
    out.push_str(&format!("  min confidence    {:.2}\n", e.min_signal_confidence));
    out.push_str(&format!("  dry run           {}\n", e.dry_run));

    out.push_str(&format!("Watchlist ({})\n", config.watchlist.len()));
    for entry in &config.watchlist {
        match &entry.reference_id {
            Some(reference) => out.push_str(&format!("  {} <- {}\n", entry.market_id, reference)),
            None => out.push_str(&format!("  {}\n", entry.market_id)),
        }
    }
    out
}

/// Human-readable status snapshot for `status`
pub fn render_status(status: &StatusSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!("State            {}\n", status.state));
    out.push_str(&format!("Risk level       {}\n", status.risk_level));
    out.push_str(&format!("Daily PnL        ${}\n", status.daily_pnl.round_dp(2)));
    out.push_str(&format!("Total PnL        ${}\n", status.total_pnl.round_dp(2)));
    out.push_str(&format!(
        "Positions        {} open, {} locked\n",
        status.open_positions, status.locked_positions
    ));
    out.push_str(&format!("Exposure         ${}\n", status.total_exposure.round_dp(2)));
    out.push_str(&format!("Trades today     {}\n", status.daily_trades));
    out.push_str(&format!(
        "Errors           {} ({} rejections)\n",
        status.errors.total_errors(),
        status.errors.rejected
    ));
    for warning in &status.warnings {
        out.push_str(&format!("  ! {}\n", warning));
    }
    out.push_str(&format!(
        "Updated          {} (cycle {})\n",
        status.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        status.cycles
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EngineState;
    use crate::services::ErrorTally;
    use crate::strategy::RiskLevel;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_to_run() {
        let cli = Cli::try_parse_from(["hedgegate"]).unwrap();
        assert_eq!(cli.command(), Commands::Run { once: false });
        assert_eq!(cli.config_dir, PathBuf::from("config"));
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["hedgegate", "run", "--once"]).unwrap();
        assert_eq!(cli.command(), Commands::Run { once: true });

        let cli = Cli::try_parse_from(["hedgegate", "-c", "/etc/hg", "check-config"]).unwrap();
        assert_eq!(cli.command(), Commands::CheckConfig);
        assert_eq!(cli.config_dir, PathBuf::from("/etc/hg"));

        let cli = Cli::try_parse_from(["hedgegate", "status", "--path", "s.json"]).unwrap();
        assert_eq!(
            cli.command(),
            Commands::Status {
                path: Some(PathBuf::from("s.json"))
            }
        );
    }

    #[test]
    fn test_render_config_lists_watchlist() {
        let mut config = AppConfig::default_config(&["m1", "m2"]);
        config.watchlist[0].reference_id = Some("ref-1".to_string());
        let rendered = render_config(&config);
        assert!(rendered.contains("m1 <- ref-1"));
        assert!(rendered.contains("Watchlist (2)"));
    }

    #[test]
    fn test_render_status() {
        let status = StatusSnapshot {
            daily_pnl: dec!(-81),
            open_positions: 1,
            risk_level: RiskLevel::Critical,
            locked_positions: 0,
            total_pnl: dec!(-81),
            state: EngineState::Halted,
            daily_trades: 3,
            total_exposure: dec!(10),
            cycles: 12,
            errors: ErrorTally::default(),
            warnings: vec!["Approaching daily loss limit".to_string()],
            updated_at: Utc::now(),
        };
        let rendered = render_status(&status);
        assert!(rendered.contains("HALTED"));
        assert!(rendered.contains("critical"));
        assert!(rendered.contains("Approaching daily loss limit"));
    }
}
