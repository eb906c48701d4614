use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::config::{EngineConfig, TradingConfig};
use crate::domain::{MarketSnapshot, SignalType, TargetSide, TradingSignal, WhaleTrade};

/// Observations kept per market
const HISTORY_LEN: usize = 60;
/// Momentum compares the latest price with the one this many points back
const MOMENTUM_LOOKBACK: usize = 5;
/// Execution venue must lag the reference by more than this
const MOMENTUM_MIN_LAG: Decimal = dec!(0.02);
const MOMENTUM_SCALE: f64 = 5.0;
const MOMENTUM_MAX_CONFIDENCE: f64 = 0.9;

const WHALE_LARGE_AMOUNT: Decimal = dec!(5000);

const ARB_CONFIDENCE: f64 = 0.95;
const CHEAP_SIDE_MAX_PRICE: Decimal = dec!(0.3);
const CHEAP_SIDE_GAP: Decimal = dec!(0.1);
const CHEAP_SIDE_CONFIDENCE: f64 = 0.6;

const OVERBOUGHT: Decimal = dec!(0.92);
const OVERSOLD: Decimal = dec!(0.08);
const SENTIMENT_CONFIDENCE: f64 = 0.4;

/// Rolling window of reference-venue YES prices
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    prices: VecDeque<(DateTime<Utc>, Decimal)>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a price observation
    pub fn push(&mut self, timestamp: DateTime<Utc>, price: Decimal) {
        self.prices.push_back((timestamp, price));
        while self.prices.len() > HISTORY_LEN {
            self.prices.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn latest(&self) -> Option<Decimal> {
        self.prices.back().map(|(_, p)| *p)
    }

    /// Latest price minus the price `MOMENTUM_LOOKBACK` points back
    /// (or the oldest one while the window fills)
    pub fn momentum(&self) -> Option<Decimal> {
        if self.prices.len() < 2 {
            return None;
        }
        let latest = self.latest()?;
        let index = self.prices.len().saturating_sub(MOMENTUM_LOOKBACK);
        let (_, previous) = self.prices.get(index)?;
        Some(latest - *previous)
    }
}

/// What a strategy looks at
#[derive(Debug, Clone, Copy)]
pub enum SignalInput<'a> {
    Market {
        snapshot: &'a MarketSnapshot,
        history: Option<&'a PriceHistory>,
    },
    /// Large trade on the reference venue, mapped to the execution market
    Whale {
        trade: &'a WhaleTrade,
        market_id: &'a str,
    },
}

#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    pub threshold: Decimal,
}

impl MomentumStrategy {
    /// Reference venue moving ahead of a lagging execution venue
    fn evaluate(
        &self,
        snapshot: &MarketSnapshot,
        history: &PriceHistory,
    ) -> Option<TradingSignal> {
        let momentum = history.momentum()?;
        let reference = snapshot.reference_yes?;
        let lag = reference - snapshot.yes_price;

        let side = if momentum > self.threshold && lag > MOMENTUM_MIN_LAG {
            TargetSide::Yes
        } else if momentum < -self.threshold && lag < -MOMENTUM_MIN_LAG {
            TargetSide::No
        } else {
            return None;
        };

        let confidence = (momentum.abs().to_f64().unwrap_or(0.0) * MOMENTUM_SCALE)
            .min(MOMENTUM_MAX_CONFIDENCE);

        Some(
            TradingSignal::new(
                SignalType::Momentum,
                snapshot.market_id.clone(),
                side,
                confidence,
                lag,
                "reference_momentum",
            )
            .with_meta("reference_price", reference.to_string())
            .with_meta("execution_price", snapshot.yes_price.to_string())
            .with_meta("momentum", momentum.to_string()),
        )
    }
}

#[derive(Debug, Clone)]
pub struct WhaleFollowStrategy {
    pub min_amount: Decimal,
    pub tracked: Vec<String>,
}

impl WhaleFollowStrategy {
    fn evaluate(&self, trade: &WhaleTrade, market_id: &str) -> Option<TradingSignal> {
        if trade.amount < self.min_amount {
            return None;
        }
        if !self.tracked.iter().any(|w| w == &trade.trader) {
            return None;
        }

        let confidence = if trade.amount > WHALE_LARGE_AMOUNT {
            0.7
        } else {
            0.5
        };

        Some(
            TradingSignal::new(
                SignalType::WhaleFollow,
                market_id,
                trade.side.into(),
                confidence,
                dec!(0.05),
                format!("whale_{}", trade.trader),
            )
            .with_meta("wallet", trade.trader.clone())
            .with_meta("amount", trade.amount.to_string())
            .with_meta("reference_market", trade.market_id.clone()),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ArbitrageStrategy {
    pub threshold: Decimal,
}

impl ArbitrageStrategy {
    fn evaluate(&self, snapshot: &MarketSnapshot) -> Option<TradingSignal> {
        let yes = snapshot.yes_price;
        let no = snapshot.no_price;
        let pair_sum = snapshot.pair_sum();

        if pair_sum < Decimal::ONE - self.threshold {
            return Some(
                TradingSignal::new(
                    SignalType::Arbitrage,
                    snapshot.market_id.clone(),
                    TargetSide::Both,
                    ARB_CONFIDENCE,
                    Decimal::ONE - pair_sum,
                    "pair_arb",
                )
                .with_meta("yes_price", yes.to_string())
                .with_meta("no_price", no.to_string())
                .with_meta("pair_cost", pair_sum.to_string()),
            );
        }

        let (side, source) = if yes < CHEAP_SIDE_MAX_PRICE && yes < no - CHEAP_SIDE_GAP {
            (TargetSide::Yes, "cheap_yes")
        } else if no < CHEAP_SIDE_MAX_PRICE && no < yes - CHEAP_SIDE_GAP {
            (TargetSide::No, "cheap_no")
        } else {
            return None;
        };

        Some(
            TradingSignal::new(
                SignalType::Arbitrage,
                snapshot.market_id.clone(),
                side,
                CHEAP_SIDE_CONFIDENCE,
                dec!(0.10),
                source,
            )
            .with_meta("yes_price", yes.to_string())
            .with_meta("no_price", no.to_string()),
        )
    }
}

/// Mean reversion at extreme prices
#[derive(Debug, Clone, Default)]
pub struct SentimentStrategy;

impl SentimentStrategy {
    fn evaluate(&self, snapshot: &MarketSnapshot) -> Option<TradingSignal> {
        let yes = snapshot.reference_yes.unwrap_or(snapshot.yes_price);

        let (side, expected_move, source) = if yes > OVERBOUGHT {
            (TargetSide::No, dec!(-0.05), "overbought")
        } else if yes < OVERSOLD {
            (TargetSide::Yes, dec!(0.05), "oversold")
        } else {
            return None;
        };

        Some(
            TradingSignal::new(
                SignalType::Sentiment,
                snapshot.market_id.clone(),
                side,
                SENTIMENT_CONFIDENCE,
                expected_move,
                source,
            )
            .with_meta("yes_price", yes.to_string()),
        )
    }
}

/// Closed set of signal strategies behind one interface
#[derive(Debug, Clone)]
pub enum Strategy {
    Momentum(MomentumStrategy),
    WhaleFollow(WhaleFollowStrategy),
    Arbitrage(ArbitrageStrategy),
    Sentiment(SentimentStrategy),
}

impl Strategy {
    /// Inputs a strategy does not understand yield `None`
    pub fn evaluate(&self, input: &SignalInput<'_>) -> Option<TradingSignal> {
        match (self, input) {
            (Strategy::Momentum(s), SignalInput::Market { snapshot, history }) => {
                s.evaluate(snapshot, (*history)?)
            }
            (Strategy::WhaleFollow(s), SignalInput::Whale { trade, market_id }) => {
                s.evaluate(trade, market_id)
            }
            (Strategy::Arbitrage(s), SignalInput::Market { snapshot, .. }) => s.evaluate(snapshot),
            (Strategy::Sentiment(s), SignalInput::Market { snapshot, .. }) => s.evaluate(snapshot),
            _ => None,
        }
    }
}

/// Runs every strategy over a cycle's inputs
#[derive(Debug)]
pub struct SignalGenerator {
    strategies: Vec<Strategy>,
    histories: HashMap<String, PriceHistory>,
}

impl SignalGenerator {
    pub fn new(strategies: Vec<Strategy>) -> Self {
        Self {
            strategies,
            histories: HashMap::new(),
        }
    }

    /// All four strategies configured from the trading and engine sections
    pub fn from_config(trading: &TradingConfig, engine: &EngineConfig) -> Self {
        Self::new(vec![
            Strategy::Arbitrage(ArbitrageStrategy {
                threshold: trading.arb_threshold,
            }),
            Strategy::Momentum(MomentumStrategy {
                threshold: trading.momentum_threshold,
            }),
            Strategy::WhaleFollow(WhaleFollowStrategy {
                min_amount: trading.whale_min_amount,
                tracked: engine.tracked_whales.clone(),
            }),
            Strategy::Sentiment(SentimentStrategy),
        ])
    }

    /// Record the reference price for a market, keyed by execution market id
    pub fn record_price(&mut self, market_id: &str, timestamp: DateTime<Utc>, price: Decimal) {
        self.histories
            .entry(market_id.to_string())
            .or_default()
            .push(timestamp, price);
    }

    /// Evaluate every strategy against one cycle's snapshots and whale prints.
    /// Whale trades come paired with the execution market they map to.
    pub fn generate(
        &mut self,
        snapshots: &[MarketSnapshot],
        whales: &[(WhaleTrade, String)],
    ) -> Vec<TradingSignal> {
        for snapshot in snapshots {
            if let Some(reference) = snapshot.reference_yes {
                self.record_price(&snapshot.market_id, snapshot.timestamp, reference);
            }
        }

        let mut signals = Vec::new();
        for snapshot in snapshots {
            let input = SignalInput::Market {
                snapshot,
                history: self.histories.get(&snapshot.market_id),
            };
            signals.extend(self.strategies.iter().filter_map(|s| s.evaluate(&input)));
        }

        for (trade, market_id) in whales {
            let input = SignalInput::Whale {
                trade,
                market_id: market_id.as_str(),
            };
            signals.extend(self.strategies.iter().filter_map(|s| s.evaluate(&input)));
        }

        debug!(
            markets = snapshots.len(),
            whales = whales.len(),
            signals = signals.len(),
            "signals generated"
        );
        signals
    }

    /// Keep the most confident signal per (market, side), most confident first
    pub fn aggregate(signals: Vec<TradingSignal>) -> Vec<TradingSignal> {
        let mut best: HashMap<(String, TargetSide), TradingSignal> = HashMap::new();
        for signal in signals {
            let key = (signal.market_id.clone(), signal.side);
            match best.get(&key) {
                Some(existing) if existing.confidence >= signal.confidence => {}
                _ => {
                    best.insert(key, signal);
                }
            }
        }

        let mut unique: Vec<TradingSignal> = best.into_values().collect();
        unique.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.market_id.cmp(&b.market_id))
        });
        unique
    }

    pub fn filter_by_confidence(
        signals: Vec<TradingSignal>,
        min_confidence: f64,
    ) -> Vec<TradingSignal> {
        signals
            .into_iter()
            .filter(|s| s.confidence >= min_confidence)
            .collect()
    }
}
