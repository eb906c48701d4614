use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub watchlist: Vec<WatchlistEntry>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Numeric trading parameters shared by the risk gate, tracker and signal generator
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Largest dollar amount for a single order
    pub max_trade_amount: Decimal,
    /// Smallest dollar amount for a single order
    pub min_trade_amount: Decimal,
    /// Daily realized loss (USD, positive number) that trips the breaker
    pub max_daily_loss: Decimal,
    /// Maximum fills per calendar day
    pub daily_trade_limit: u32,
    /// Maximum number of markets with open exposure
    pub max_open_positions: usize,
    /// Dollar ceiling on exposure per market
    pub max_single_position: Decimal,
    /// Required edge below 1.0 for pair cost / pair sum (e.g., 0.03 = 3%)
    pub arb_threshold: Decimal,
    /// How far one side must trade below the other to count as cheap on a fresh position
    pub cheap_side_threshold: Decimal,
    /// Minimum reference-venue move to emit a momentum signal
    pub momentum_threshold: Decimal,
    /// Minimum whale trade notional (USD)
    pub whale_min_amount: Decimal,
    /// Directional position stop loss (e.g., 0.25 = close at -25%)
    pub stop_loss_percent: Decimal,
    /// Directional position take profit (e.g., 0.50 = close at +50%)
    pub take_profit_percent: Decimal,
    /// Unlocked hedge positions are exited once their marked loss exceeds this share of cost
    pub max_unhedged_loss_percent: Decimal,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            max_trade_amount: dec!(25),
            min_trade_amount: dec!(1),
            max_daily_loss: dec!(100),
            daily_trade_limit: 50,
            max_open_positions: 10,
            max_single_position: dec!(100),
            arb_threshold: dec!(0.03),
            cheap_side_threshold: dec!(0.15),
            momentum_threshold: dec!(0.05),
            whale_min_amount: dec!(1000),
            stop_loss_percent: dec!(0.25),
            take_profit_percent: dec!(0.50),
            max_unhedged_loss_percent: dec!(0.20),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between poll cycles
    pub poll_interval_secs: u64,
    /// Per-call timeout for venue requests in milliseconds
    pub request_timeout_ms: u64,
    /// Signals below this confidence are dropped after aggregation
    pub min_signal_confidence: f64,
    /// Liquidate open exposure when the breaker halts the engine
    pub force_close_on_halt: bool,
    /// Status snapshot written every cycle
    pub status_path: PathBuf,
    /// Append-only JSONL signal/outcome log
    pub signal_log_path: PathBuf,
    /// Wallets / usernames whose large trades are followed
    pub tracked_whales: Vec<String>,
    /// Trade against the in-memory paper venue
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            request_timeout_ms: 5000,
            min_signal_confidence: 0.35,
            force_close_on_halt: false,
            status_path: PathBuf::from("data/status.json"),
            signal_log_path: PathBuf::from("data/signals.jsonl"),
            tracked_whales: vec![
                "ImJustKen".to_string(),
                "SwissMiss".to_string(),
                "fengdubiying".to_string(),
            ],
            dry_run: true,
        }
    }
}

/// One market eligible for signal evaluation
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WatchlistEntry {
    /// Execution venue market id
    pub market_id: String,
    /// Linked reference venue market used for momentum
    #[serde(default)]
    pub reference_id: Option<String>,
    /// Starting YES price on the paper venue
    #[serde(default)]
    pub seed_yes_price: Option<Decimal>,
}

impl WatchlistEntry {
    pub fn new(market_id: impl Into<String>) -> Self {
        Self {
            market_id: market_id.into(),
            reference_id: None,
            seed_yes_price: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("HEDGEGATE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (HEDGEGATE_TRADING__MAX_TRADE_AMOUNT, etc.)
            .add_source(
                Environment::with_prefix("HEDGEGATE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Default configuration watching the given markets
    pub fn default_config(markets: &[&str]) -> Self {
        Self {
            trading: TradingConfig::default(),
            engine: EngineConfig::default(),
            watchlist: markets.iter().map(|m| WatchlistEntry::new(*m)).collect(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration, returning every violated constraint
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let t = &self.trading;

        let unit_interval = [
            ("arb_threshold", t.arb_threshold),
            ("cheap_side_threshold", t.cheap_side_threshold),
            ("momentum_threshold", t.momentum_threshold),
            ("stop_loss_percent", t.stop_loss_percent),
            ("max_unhedged_loss_percent", t.max_unhedged_loss_percent),
        ];
        for (name, value) in unit_interval {
            if value <= Decimal::ZERO || value >= Decimal::ONE {
                errors.push(format!("{name} must be between 0 and 1, got {value}"));
            }
        }

        if t.take_profit_percent <= Decimal::ZERO {
            errors.push("take_profit_percent must be positive".to_string());
        }

        if t.min_trade_amount <= Decimal::ZERO {
            errors.push("min_trade_amount must be positive".to_string());
        }

        if t.min_trade_amount > t.max_trade_amount {
            errors.push(format!(
                "min_trade_amount ({}) exceeds max_trade_amount ({})",
                t.min_trade_amount, t.max_trade_amount
            ));
        }

        if t.max_daily_loss <= Decimal::ZERO {
            errors.push("max_daily_loss must be positive".to_string());
        }

        if t.max_single_position <= Decimal::ZERO {
            errors.push("max_single_position must be positive".to_string());
        }

        if t.daily_trade_limit == 0 {
            errors.push("daily_trade_limit must be positive".to_string());
        }

        if t.max_open_positions == 0 {
            errors.push("max_open_positions must be positive".to_string());
        }

        if t.whale_min_amount < Decimal::ZERO {
            errors.push("whale_min_amount must not be negative".to_string());
        }

        if !(0.0..=1.0).contains(&self.engine.min_signal_confidence) {
            errors.push("min_signal_confidence must be within [0, 1]".to_string());
        }

        if self.engine.poll_interval_secs == 0 {
            errors.push("poll_interval_secs must be positive".to_string());
        }

        if self.engine.request_timeout_ms == 0 {
            errors.push("request_timeout_ms must be positive".to_string());
        }

        if self.watchlist.is_empty() {
            errors.push("watchlist must contain at least one market".to_string());
        }

        for entry in &self.watchlist {
            if entry.market_id.trim().is_empty() {
                errors.push("watchlist entry has an empty market_id".to_string());
            }
            if let Some(seed) = entry.seed_yes_price {
                if seed <= Decimal::ZERO || seed >= Decimal::ONE {
                    errors.push(format!(
                        "seed_yes_price for {} must be between 0 and 1",
                        entry.market_id
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default_config(&["m1"]);
        assert!(config.validate().is_ok());
        assert_eq!(config.trading.max_trade_amount, dec!(25));
        assert_eq!(config.trading.daily_trade_limit, 50);
        assert_eq!(config.engine.tracked_whales.len(), 3);
    }

    #[test]
    fn test_validate_collects_every_error() {
        let mut config = AppConfig::default_config(&[]);
        config.trading.arb_threshold = dec!(1.5);
        config.trading.min_trade_amount = dec!(50);

        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("arb_threshold")));
        assert!(errors.iter().any(|e| e.contains("exceeds max_trade_amount")));
        assert!(errors.iter().any(|e| e.contains("watchlist")));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
[trading]
max_trade_amount = 40
arb_threshold = 0.02

[engine]
poll_interval_secs = 5

[[watchlist]]
market_id = "pres-2028"
reference_id = "PRES28"
seed_yes_price = 0.42
"#
        )
        .unwrap();

        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.trading.max_trade_amount, dec!(40));
        assert_eq!(config.trading.arb_threshold, dec!(0.02));
        // untouched fields keep their defaults
        assert_eq!(config.trading.max_daily_loss, dec!(100));
        assert_eq!(config.engine.poll_interval_secs, 5);
        assert_eq!(config.watchlist.len(), 1);
        assert_eq!(config.watchlist[0].reference_id.as_deref(), Some("PRES28"));
        assert_eq!(config.watchlist[0].seed_yes_price, Some(dec!(0.42)));
    }
}
