use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{HedgeError, Result};

/// Outcome side of a binary market (YES or NO)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Side a signal or risk position refers to; `Both` is a hedged pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSide {
    Yes,
    No,
    Both,
}

impl TargetSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetSide::Yes => "yes",
            TargetSide::No => "no",
            TargetSide::Both => "both",
        }
    }

    /// Concrete legs this target expands into
    pub fn legs(&self) -> Vec<Side> {
        match self {
            TargetSide::Yes => vec![Side::Yes],
            TargetSide::No => vec![Side::No],
            TargetSide::Both => vec![Side::Yes, Side::No],
        }
    }

    /// Combine with another leg in the same market
    pub fn merge(self, side: Side) -> Self {
        match (self, side) {
            (TargetSide::Yes, Side::Yes) => TargetSide::Yes,
            (TargetSide::No, Side::No) => TargetSide::No,
            _ => TargetSide::Both,
        }
    }
}

impl From<Side> for TargetSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Yes => TargetSide::Yes,
            Side::No => TargetSide::No,
        }
    }
}

impl std::fmt::Display for TargetSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw quote as returned by a market data feed; fields may be missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub market_id: String,
    pub yes_price: Option<Decimal>,
    pub no_price: Option<Decimal>,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Set once the market has settled
    #[serde(default)]
    pub resolved: Option<Side>,
}

impl MarketQuote {
    pub fn new(market_id: impl Into<String>, yes_price: Decimal, no_price: Decimal) -> Self {
        Self {
            market_id: market_id.into(),
            yes_price: Some(yes_price),
            no_price: Some(no_price),
            volume: Decimal::ONE_HUNDRED,
            timestamp: Utc::now(),
            resolved: None,
        }
    }

    /// Check the quote is usable for signal generation
    pub fn validate(&self) -> Result<MarketSnapshot> {
        let yes_price = self.yes_price.ok_or_else(|| {
            HedgeError::MalformedData(format!("{}: missing yes_price", self.market_id))
        })?;
        let no_price = self.no_price.ok_or_else(|| {
            HedgeError::MalformedData(format!("{}: missing no_price", self.market_id))
        })?;

        for (name, price) in [("yes_price", yes_price), ("no_price", no_price)] {
            if price <= Decimal::ZERO || price >= Decimal::ONE {
                return Err(HedgeError::MalformedData(format!(
                    "{}: {} {} outside (0, 1)",
                    self.market_id, name, price
                )));
            }
        }

        if self.volume <= Decimal::ZERO {
            return Err(HedgeError::MalformedData(format!(
                "{}: zero volume",
                self.market_id
            )));
        }

        Ok(MarketSnapshot {
            market_id: self.market_id.clone(),
            yes_price,
            no_price,
            volume: self.volume,
            timestamp: self.timestamp,
            reference_yes: None,
        })
    }
}

/// Validated view of one market for a single poll cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market_id: String,
    pub yes_price: Decimal,
    pub no_price: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
    /// YES price of the linked market on the reference venue
    pub reference_yes: Option<Decimal>,
}

impl MarketSnapshot {
    pub fn price(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes_price,
            Side::No => self.no_price,
        }
    }

    /// YES + NO; below 1.0 means both legs can be bought for less than the payout
    pub fn pair_sum(&self) -> Decimal {
        self.yes_price + self.no_price
    }
}

/// A large trade by a tracked account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleTrade {
    pub trader: String,
    pub market_id: String,
    pub side: Side,
    /// Notional in USD
    pub amount: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Yes.opposite(), Side::No);
        assert_eq!(Side::No.opposite(), Side::Yes);
    }

    #[test]
    fn test_target_side_merge() {
        assert_eq!(TargetSide::Yes.merge(Side::Yes), TargetSide::Yes);
        assert_eq!(TargetSide::Yes.merge(Side::No), TargetSide::Both);
        assert_eq!(TargetSide::Both.legs(), vec![Side::Yes, Side::No]);
    }

    #[test]
    fn test_quote_validation() {
        let quote = MarketQuote::new("m1", dec!(0.40), dec!(0.58));
        let snapshot = quote.validate().unwrap();
        assert_eq!(snapshot.pair_sum(), dec!(0.98));

        let mut missing = quote.clone();
        missing.no_price = None;
        assert!(matches!(
            missing.validate(),
            Err(HedgeError::MalformedData(_))
        ));

        let mut idle = quote.clone();
        idle.volume = Decimal::ZERO;
        assert!(idle.validate().is_err());

        let mut out_of_range = quote;
        out_of_range.yes_price = Some(dec!(1.2));
        assert!(out_of_range.validate().is_err());
    }
}
