use hedgegate::config::{AppConfig, LoggingConfig};
use hedgegate::exchange::{PaperExchange, VenueKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Cash the paper execution venue starts with
pub const PAPER_STARTING_CASH: Decimal = dec!(1000);
const EXECUTION_DRIFT_CENTS: i64 = 2;
const REFERENCE_DRIFT_CENTS: i64 = 3;

pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hedgegate=debug", config.level)));

    // `rolling::daily` panics if the first file can't be created, so check first
    let file_layer = config.dir.as_deref().and_then(|dir| {
        if let Err(e) = writable_dir(dir) {
            eprintln!(
                "Warning: Could not write to log directory {} ({}), file logging disabled",
                dir.display(),
                e
            );
            return None;
        }
        let file_appender = tracing_appender::rolling::daily(dir, "hedgegate.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Flushes on drop; lives for the whole process
        Box::leak(Box::new(guard));
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
    });

    let (json_layer, text_layer) = if config.json {
        (Some(tracing_subscriber::fmt::layer().json().with_target(true)), None)
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
        )
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, &config.dir) {
        eprintln!("Logging to: {}/hedgegate.log", dir.display());
    }
}

pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

fn writable_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let marker = dir.join(".hedgegate_write_test");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&marker)?;
    let _ = std::fs::remove_file(&marker);
    Ok(())
}

/// Paper execution venue plus, when any market links one, a paper reference venue
pub async fn build_paper_venues(
    config: &AppConfig,
) -> (Arc<PaperExchange>, Option<Arc<PaperExchange>>) {
    let execution = PaperExchange::new(VenueKind::Paper, PAPER_STARTING_CASH);
    let reference = PaperExchange::new(VenueKind::Reference, Decimal::ZERO);
    let mut linked = false;

    for entry in &config.watchlist {
        let seed = entry.seed_yes_price.unwrap_or(dec!(0.50));
        execution
            .add_market(&entry.market_id, seed, EXECUTION_DRIFT_CENTS)
            .await;
        if let Some(reference_id) = &entry.reference_id {
            reference
                .add_market(reference_id, seed, REFERENCE_DRIFT_CENTS)
                .await;
            linked = true;
        }
    }

    (Arc::new(execution), linked.then(|| Arc::new(reference)))
}
