//! Append-only JSONL log of signals and position outcomes.
//!
//! One record per line, tagged by `kind`, for offline strategy evaluation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::domain::{Side, SignalType, TargetSide, TradingSignal};
use crate::error::Result;

/// A signal the orchestrator consumed this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub timestamp: DateTime<Utc>,
    pub signal_type: SignalType,
    pub market_id: String,
    pub side: TargetSide,
    pub confidence: f64,
    pub expected_move: Decimal,
    pub source: String,
    pub executed: bool,
    /// Dollars sent to the venue when executed
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Risk rejection or execution failure
    #[serde(default)]
    pub note: Option<String>,
}

impl SignalRecord {
    pub fn from_signal(signal: &TradingSignal) -> Self {
        Self {
            timestamp: Utc::now(),
            signal_type: signal.signal_type,
            market_id: signal.market_id.clone(),
            side: signal.side,
            confidence: signal.confidence,
            expected_move: signal.expected_move,
            source: signal.source.clone(),
            executed: false,
            amount: None,
            note: None,
        }
    }

    pub fn executed(mut self, amount: Decimal) -> Self {
        self.executed = true;
        self.amount = Some(self.amount.unwrap_or_default() + amount);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Realized pnl of a position (or the part of it sold), by resolution or
/// forced exit, attributed to the signals whose fills built it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub timestamp: DateTime<Utc>,
    pub market_id: String,
    /// Winning side, `None` for an exit before resolution
    pub outcome: Option<Side>,
    pub realized_pnl: Decimal,
    pub reason: String,
    #[serde(default)]
    pub signal_types: Vec<SignalType>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl OutcomeRecord {
    pub fn new(
        market_id: impl Into<String>,
        outcome: Option<Side>,
        realized_pnl: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            market_id: market_id.into(),
            outcome,
            realized_pnl,
            reason: reason.into(),
            signal_types: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn attributed(mut self, origins: &[(SignalType, String)]) -> Self {
        for (signal_type, source) in origins {
            if !self.signal_types.contains(signal_type) {
                self.signal_types.push(*signal_type);
            }
            if !self.sources.contains(source) {
                self.sources.push(source.clone());
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogRecord {
    Signal(SignalRecord),
    Outcome(OutcomeRecord),
}

/// JSONL writer
#[derive(Debug, Clone)]
pub struct SignalLog {
    path: PathBuf,
}

impl SignalLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append records in one write
    pub async fn append(&self, records: &[LogRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;

        debug!(count = records.len(), path = ?self.path, "appended signal log records");
        Ok(())
    }

    /// Read every record back; blank lines are skipped
    pub async fn read_all(path: impl AsRef<Path>) -> Result<Vec<LogRecord>> {
        let content = tokio::fs::read_to_string(path).await?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = SignalLog::new(dir.path().join("nested/signals.jsonl"));

        let signal = TradingSignal::new(
            SignalType::Arbitrage,
            "m1",
            TargetSide::Both,
            0.95,
            dec!(0.05),
            "pair_arb",
        );
        let executed = SignalRecord::from_signal(&signal).executed(dec!(10));
        let rejected = SignalRecord::from_signal(&signal).with_note("Daily trade limit reached (50)");

        log.append(&[LogRecord::Signal(executed), LogRecord::Signal(rejected)])
            .await
            .unwrap();
        let outcome = OutcomeRecord::new("m1", Some(Side::Yes), dec!(1.875), "resolved")
            .attributed(&[
                (SignalType::Arbitrage, "mechanical_arb".to_string()),
                (SignalType::Arbitrage, "pair_arb".to_string()),
                (SignalType::Arbitrage, "mechanical_arb".to_string()),
            ]);
        log.append(&[LogRecord::Outcome(outcome)]).await.unwrap();

        let records = SignalLog::read_all(log.path()).await.unwrap();
        assert_eq!(records.len(), 3);
        match &records[0] {
            LogRecord::Signal(r) => {
                assert!(r.executed);
                assert_eq!(r.amount, Some(dec!(10)));
            }
            other => panic!("unexpected record {other:?}"),
        }
        match &records[2] {
            LogRecord::Outcome(r) => {
                assert_eq!(r.realized_pnl, dec!(1.875));
                assert_eq!(r.signal_types, vec![SignalType::Arbitrage]);
                assert_eq!(r.sources, vec!["mechanical_arb", "pair_arb"]);
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_records_are_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let log = SignalLog::new(dir.path().join("signals.jsonl"));
        let outcome = OutcomeRecord::new("m2", None, dec!(-2.5), "unhedged_exit")
            .attributed(&[(SignalType::WhaleFollow, "whale:SwissMiss".to_string())]);
        log.append(&[LogRecord::Outcome(outcome)]).await.unwrap();

        let raw = tokio::fs::read_to_string(log.path()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
        assert_eq!(value["kind"], "outcome");
        assert_eq!(value["market_id"], "m2");
        assert_eq!(value["signal_types"][0], "whale_follow");
    }
}
