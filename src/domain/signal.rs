use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::TargetSide;

/// Strategy family a signal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Momentum,
    WhaleFollow,
    Arbitrage,
    Sentiment,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Momentum => "momentum",
            SignalType::WhaleFollow => "whale_follow",
            SignalType::Arbitrage => "arbitrage",
            SignalType::Sentiment => "sentiment",
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized output of any strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub signal_type: SignalType,
    pub market_id: String,
    pub side: TargetSide,
    /// In [0, 1]
    pub confidence: f64,
    /// Expected YES price move (negative for a downward expectation)
    pub expected_move: Decimal,
    pub source: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl TradingSignal {
    pub fn new(
        signal_type: SignalType,
        market_id: impl Into<String>,
        side: TargetSide,
        confidence: f64,
        expected_move: Decimal,
        source: impl Into<String>,
    ) -> Self {
        Self {
            signal_type,
            market_id: market_id.into(),
            side,
            confidence: confidence.clamp(0.0, 1.0),
            expected_move,
            source: source.into(),
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_confidence_is_clamped() {
        let signal = TradingSignal::new(
            SignalType::Momentum,
            "m1",
            TargetSide::Yes,
            1.7,
            dec!(0.1),
            "test",
        )
        .with_meta("momentum", 0.4);
        assert_eq!(signal.confidence, 1.0);
        assert_eq!(signal.metadata["momentum"], 0.4);

        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["signal_type"], "momentum");
        assert_eq!(json["side"], "yes");
    }
}
