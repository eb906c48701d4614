//! Status snapshot for external dashboards
//!
//! Written once per cycle as a single JSON object. Writes go to a sibling
//! temp file first and are renamed into place so readers never see a
//! half-written snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::EngineState;
use crate::error::{ErrorKind, Result};
use crate::strategy::risk::RiskLevel;

/// Per-category error counters, cumulative since start
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTally {
    pub transient_io: u64,
    pub malformed_data: u64,
    pub execution_failed: u64,
    pub fatal: u64,
    pub internal: u64,
    /// Risk rejections are not errors but are counted for visibility
    pub rejected: u64,
}

impl ErrorTally {
    pub fn record(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::TransientIo => self.transient_io += 1,
            ErrorKind::MalformedData => self.malformed_data += 1,
            ErrorKind::ExecutionFailed => self.execution_failed += 1,
            ErrorKind::Fatal => self.fatal += 1,
            ErrorKind::Internal => self.internal += 1,
        }
    }

    pub fn record_rejection(&mut self) {
        self.rejected += 1;
    }

    pub fn total_errors(&self) -> u64 {
        self.transient_io + self.malformed_data + self.execution_failed + self.fatal + self.internal
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(with = "rust_decimal::serde::float")]
    pub daily_pnl: Decimal,
    pub open_positions: usize,
    pub risk_level: RiskLevel,
    pub locked_positions: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_pnl: Decimal,
    pub state: EngineState,
    pub daily_trades: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_exposure: Decimal,
    pub cycles: u64,
    pub errors: ErrorTally,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StatusWriter {
    path: PathBuf,
}

impl StatusWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, snapshot: &StatusSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = ?self.path, state = %snapshot.state, "status snapshot written");
        Ok(())
    }

    pub async fn read(path: impl AsRef<Path>) -> Result<StatusSnapshot> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            daily_pnl: dec!(-12.5),
            open_positions: 2,
            risk_level: RiskLevel::Low,
            locked_positions: 1,
            total_pnl: dec!(3.75),
            state: EngineState::Polling,
            daily_trades: 4,
            total_exposure: dec!(40),
            cycles: 7,
            errors: ErrorTally::default(),
            warnings: vec![],
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_tally_counts_by_kind() {
        let mut tally = ErrorTally::default();
        tally.record(ErrorKind::TransientIo);
        tally.record(ErrorKind::TransientIo);
        tally.record(ErrorKind::ExecutionFailed);
        tally.record_rejection();

        assert_eq!(tally.transient_io, 2);
        assert_eq!(tally.execution_failed, 1);
        assert_eq!(tally.rejected, 1);
        assert_eq!(tally.total_errors(), 3);
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let writer = StatusWriter::new(dir.path().join("data/status.json"));

        writer.write(&snapshot()).await.unwrap();
        let read = StatusWriter::read(writer.path()).await.unwrap();
        assert_eq!(read.daily_pnl, dec!(-12.5));
        assert_eq!(read.locked_positions, 1);
        assert_eq!(read.state, EngineState::Polling);

        // no temp file left behind
        assert!(!writer.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_dashboard_fields_are_plain_json() {
        let dir = tempfile::tempdir().unwrap();
        let writer = StatusWriter::new(dir.path().join("status.json"));
        writer.write(&snapshot()).await.unwrap();

        let raw = std::fs::read_to_string(writer.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["daily_pnl"], -12.5);
        assert_eq!(value["total_pnl"], 3.75);
        assert_eq!(value["risk_level"], "low");
        assert_eq!(value["open_positions"], 2);
    }
}
