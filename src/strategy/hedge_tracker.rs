//! Hedge-arbitrage position book.
//!
//! Builds YES/NO positions one leg at a time:
//! 1. Enter the side trading well below its complement
//! 2. Average down while a held side trades below 90% of its running average
//! 3. Buy the other side back to parity once the pair can be completed under target
//! 4. Once avg(YES) + avg(NO) < $1 the position is locked and held to resolution
//!
//! All amounts are dollars; contracts = amount / price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::TradingConfig;
use crate::domain::Side;
use crate::error::{HedgeError, Result};

/// Price must fall below this share of the running average to average down
const AVERAGE_DOWN_RATIO: Decimal = dec!(0.9);
/// Larger leg must exceed the smaller by this ratio before rebalancing
const REBALANCE_RATIO: Decimal = dec!(1.2);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Locks must complete at or below 1 - arb_threshold per pair
    pub arb_threshold: Decimal,
    /// Fresh entry requires one side this far below the other
    pub cheap_side_threshold: Decimal,
    pub max_trade_amount: Decimal,
    pub min_trade_amount: Decimal,
    /// Unlocked positions marked down more than this share of cost should exit
    pub max_unhedged_loss_percent: Decimal,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from(&TradingConfig::default())
    }
}

impl From<&TradingConfig> for TrackerConfig {
    fn from(t: &TradingConfig) -> Self {
        Self {
            arb_threshold: t.arb_threshold,
            cheap_side_threshold: t.cheap_side_threshold,
            max_trade_amount: t.max_trade_amount,
            min_trade_amount: t.min_trade_amount,
            max_unhedged_loss_percent: t.max_unhedged_loss_percent,
        }
    }
}

impl TrackerConfig {
    /// Pair cost a completed hedge must reach
    pub fn target_pair_cost(&self) -> Decimal {
        Decimal::ONE - self.arb_threshold
    }

    /// Largest allowed contract imbalance between legs, so a single capped
    /// order can always buy the short leg back to parity
    fn max_imbalance(&self) -> Decimal {
        self.max_trade_amount
    }
}

/// Hedge bookkeeping for one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbPosition {
    pub market_id: String,
    pub yes_qty: Decimal,
    pub no_qty: Decimal,
    pub yes_cost: Decimal,
    pub no_cost: Decimal,
    pub locked: bool,
    /// Guaranteed profit at the moment the lock was set
    pub locked_profit: Option<Decimal>,
    /// Pnl already booked from legs sold before the position closed
    #[serde(default)]
    pub realized_pnl: Decimal,
    pub trades: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArbPosition {
    pub fn new(market_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            market_id: market_id.into(),
            yes_qty: Decimal::ZERO,
            no_qty: Decimal::ZERO,
            yes_cost: Decimal::ZERO,
            no_cost: Decimal::ZERO,
            locked: false,
            locked_profit: None,
            realized_pnl: Decimal::ZERO,
            trades: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn qty(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes_qty,
            Side::No => self.no_qty,
        }
    }

    pub fn cost(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes_cost,
            Side::No => self.no_cost,
        }
    }

    /// Running average price for a side (zero when nothing is held)
    pub fn avg(&self, side: Side) -> Decimal {
        let qty = self.qty(side);
        if qty.is_zero() {
            Decimal::ZERO
        } else {
            self.cost(side) / qty
        }
    }

    pub fn avg_yes(&self) -> Decimal {
        self.avg(Side::Yes)
    }

    pub fn avg_no(&self) -> Decimal {
        self.avg(Side::No)
    }

    pub fn pair_cost(&self) -> Decimal {
        self.avg_yes() + self.avg_no()
    }

    pub fn total_cost(&self) -> Decimal {
        self.yes_cost + self.no_cost
    }

    pub fn is_empty(&self) -> bool {
        self.yes_qty.is_zero() && self.no_qty.is_zero()
    }

    /// Both legs held with a blended pair cost under $1
    pub fn lock_condition(&self) -> bool {
        self.yes_qty > Decimal::ZERO
            && self.no_qty > Decimal::ZERO
            && self.pair_cost() < Decimal::ONE
    }

    /// Payout of the smaller leg minus everything spent
    pub fn guaranteed_profit(&self) -> Decimal {
        self.yes_qty.min(self.no_qty) - self.total_cost()
    }

    pub fn profit_if_yes_wins(&self) -> Decimal {
        self.yes_qty - self.total_cost()
    }

    pub fn profit_if_no_wins(&self) -> Decimal {
        self.no_qty - self.total_cost()
    }

    pub fn payoff(&self, outcome: Side) -> Decimal {
        match outcome {
            Side::Yes => self.profit_if_yes_wins(),
            Side::No => self.profit_if_no_wins(),
        }
    }

    /// Mark-to-market value at the given prices
    pub fn marked_value(&self, yes_price: Decimal, no_price: Decimal) -> Decimal {
        self.yes_qty * yes_price + self.no_qty * no_price
    }

    /// Apply a fill without any validation
    fn apply_buy(&mut self, side: Side, amount: Decimal, price: Decimal) {
        let contracts = amount / price;
        match side {
            Side::Yes => {
                self.yes_qty += contracts;
                self.yes_cost += amount;
            }
            Side::No => {
                self.no_qty += contracts;
                self.no_cost += amount;
            }
        }
        self.trades += 1;
        self.updated_at = Utc::now();
        if !self.locked && self.lock_condition() {
            self.locked = true;
            self.locked_profit = Some(self.guaranteed_profit());
        }
    }

    /// Position after a hypothetical buy
    fn projected(&self, side: Side, amount: Decimal, price: Decimal) -> Self {
        let mut next = self.clone();
        next.apply_buy(side, amount, price);
        next
    }
}

/// Why a buy was proposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyReason {
    FreshEntry,
    AverageDown,
    Rebalance,
}

impl BuyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuyReason::FreshEntry => "fresh_entry",
            BuyReason::AverageDown => "average_down",
            BuyReason::Rebalance => "rebalance",
        }
    }
}

/// Proposed hedge leg returned by `analyze_market`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyDecision {
    pub side: Side,
    /// Dollars
    pub amount: Decimal,
    pub expected_profit: Decimal,
    pub reason: BuyReason,
}

/// Position retired by resolution or forced exit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub position: ArbPosition,
    /// `None` for a forced exit before resolution
    pub outcome: Option<Side>,
    pub realized_pnl: Decimal,
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub open_positions: usize,
    pub locked_positions: usize,
    pub closed_positions: usize,
    pub total_trades: u32,
    pub realized_profit: Decimal,
    /// Guaranteed profit still held in open locked positions
    pub locked_profit: Decimal,
    pub total_pnl: Decimal,
}

/// Per-market hedge position book
#[derive(Debug, Default)]
pub struct ArbitragePositionTracker {
    config: TrackerConfig,
    positions: HashMap<String, ArbPosition>,
    closed: Vec<ClosedPosition>,
    total_trades: u32,
}

impl ArbitragePositionTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
            closed: Vec::new(),
            total_trades: 0,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn position(&self, market_id: &str) -> Option<&ArbPosition> {
        self.positions.get(market_id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &ArbPosition> {
        self.positions.values()
    }

    pub fn closed_positions(&self) -> &[ClosedPosition] {
        &self.closed
    }

    /// Decide the next hedge leg for a market, if any
    pub fn analyze_market(
        &self,
        yes_price: Decimal,
        no_price: Decimal,
        market_id: &str,
    ) -> Option<BuyDecision> {
        if !valid_price(yes_price) || !valid_price(no_price) {
            return None;
        }

        let position = match self.positions.get(market_id) {
            Some(p) if p.locked => {
                debug!(market = market_id, "position locked, holding to resolution");
                return None;
            }
            Some(p) if !p.is_empty() => p,
            _ => return self.fresh_entry(yes_price, no_price),
        };

        let price = |side: Side| match side {
            Side::Yes => yes_price,
            Side::No => no_price,
        };

        let candidates = [
            self.average_down(position, yes_price, no_price),
            self.rebalance(position, yes_price, no_price),
        ];

        candidates.into_iter().flatten().find(|decision| {
            let next = position.projected(decision.side, decision.amount, price(decision.side));
            // Only lock with a real edge
            let acceptable = !next.lock_condition()
                || (next.guaranteed_profit() > Decimal::ZERO
                    && next.pair_cost() <= self.config.target_pair_cost());
            acceptable && decision.expected_profit > Decimal::ZERO
        })
    }

    fn fresh_entry(&self, yes_price: Decimal, no_price: Decimal) -> Option<BuyDecision> {
        let threshold = self.config.cheap_side_threshold;
        let (side, price, other) = if yes_price < no_price - threshold {
            (Side::Yes, yes_price, no_price)
        } else if no_price < yes_price - threshold {
            (Side::No, no_price, yes_price)
        } else {
            return None;
        };

        // Half the imbalance allowance, leaving room to average down before hedging
        let amount = self.clamp_amount(self.config.max_imbalance() * price / dec!(2));
        let expected_profit = amount / price * (other - price);

        (expected_profit > Decimal::ZERO).then_some(BuyDecision {
            side,
            amount,
            expected_profit,
            reason: BuyReason::FreshEntry,
        })
    }

    fn average_down(
        &self,
        position: &ArbPosition,
        yes_price: Decimal,
        no_price: Decimal,
    ) -> Option<BuyDecision> {
        let discount = |side: Side, price: Decimal| {
            let avg = position.avg(side);
            if position.qty(side) > Decimal::ZERO && price < avg * AVERAGE_DOWN_RATIO {
                Some((side, price, Decimal::ONE - price / avg))
            } else {
                None
            }
        };

        let (side, price, _) = [discount(Side::Yes, yes_price), discount(Side::No, no_price)]
            .into_iter()
            .flatten()
            // Furthest below average first, then cheaper absolute price
            .max_by(|a, b| a.2.cmp(&b.2).then_with(|| b.1.cmp(&a.1)))?;

        let other = side.opposite();
        let other_mark = if position.qty(other) > Decimal::ZERO {
            position.avg(other)
        } else if side == Side::Yes {
            no_price
        } else {
            yes_price
        };

        let qty = position.qty(side);
        let cost = position.cost(side);
        let avg = position.avg(side);
        let target_avg = self.config.target_pair_cost() - other_mark;

        // Dollars that bring this leg's average to the target
        let sized = if target_avg > price && target_avg < avg {
            (cost - target_avg * qty) / (target_avg / price - Decimal::ONE)
        } else {
            self.config.max_trade_amount
        };

        let imbalance_room =
            (position.qty(other) + self.config.max_imbalance() - qty) * price;
        let amount = self.clamp_amount(sized).min(imbalance_room);
        if amount < self.config.min_trade_amount {
            return None;
        }

        Some(BuyDecision {
            side,
            amount,
            expected_profit: amount / price * (avg - price),
            reason: BuyReason::AverageDown,
        })
    }

    fn rebalance(
        &self,
        position: &ArbPosition,
        yes_price: Decimal,
        no_price: Decimal,
    ) -> Option<BuyDecision> {
        let side = if position.yes_qty > position.no_qty * REBALANCE_RATIO {
            Side::No
        } else if position.no_qty > position.yes_qty * REBALANCE_RATIO {
            Side::Yes
        } else {
            return None;
        };

        let price = if side == Side::Yes { yes_price } else { no_price };
        let gap = position.qty(side.opposite()) - position.qty(side);
        let amount = self.clamp_amount(gap * price);
        let expected_profit = position.projected(side, amount, price).guaranteed_profit();

        Some(BuyDecision {
            side,
            amount,
            expected_profit,
            reason: BuyReason::Rebalance,
        })
    }

    fn clamp_amount(&self, amount: Decimal) -> Decimal {
        amount
            .max(self.config.min_trade_amount)
            .min(self.config.max_trade_amount)
    }

    /// Record a filled buy. Creates the position on first buy.
    pub fn execute_buy(
        &mut self,
        market_id: &str,
        side: Side,
        amount: Decimal,
        price: Decimal,
    ) -> Result<&ArbPosition> {
        if amount <= Decimal::ZERO {
            return Err(HedgeError::Validation(format!(
                "buy amount must be positive, got {}",
                amount
            )));
        }
        if !valid_price(price) {
            return Err(HedgeError::Validation(format!(
                "price must be between 0 and 1, got {}",
                price
            )));
        }

        let position = self
            .positions
            .entry(market_id.to_string())
            .or_insert_with(|| ArbPosition::new(market_id));

        if position.locked {
            return Err(HedgeError::PositionLocked(market_id.to_string()));
        }

        position.apply_buy(side, amount, price);
        self.total_trades += 1;

        info!(
            market = market_id,
            %side,
            %amount,
            %price,
            pair_cost = %position.pair_cost().round_dp(4),
            "hedge leg bought"
        );
        if position.locked {
            info!(
                market = market_id,
                profit = %position.guaranteed_profit().round_dp(2),
                "position LOCKED"
            );
        }

        Ok(position)
    }

    /// Retire a position at resolution, returning `winning_qty - total_cost`
    pub fn close_position(&mut self, market_id: &str, outcome: Side) -> Option<Decimal> {
        let position = self.positions.remove(market_id)?;
        let realized_pnl = position.payoff(outcome);

        info!(
            market = market_id,
            %outcome,
            pnl = %realized_pnl.round_dp(2),
            locked = position.locked,
            "hedge position closed"
        );

        self.closed.push(ClosedPosition {
            realized_pnl: position.realized_pnl + realized_pnl,
            position,
            outcome: Some(outcome),
            closed_at: Utc::now(),
        });
        Some(realized_pnl)
    }

    /// Unlocked position marked down past the unhedged loss limit
    pub fn should_exit(&self, market_id: &str, yes_price: Decimal, no_price: Decimal) -> bool {
        let Some(position) = self.positions.get(market_id) else {
            return false;
        };
        if position.locked || position.total_cost().is_zero() {
            return false;
        }
        let loss = position.total_cost() - position.marked_value(yes_price, no_price);
        loss > position.total_cost() * self.config.max_unhedged_loss_percent
    }

    /// Record a filled sell of `contracts` on one leg of an unlocked position,
    /// returning `proceeds` minus the cost basis removed. The position is
    /// retired once both legs are empty.
    pub fn reduce_leg(
        &mut self,
        market_id: &str,
        side: Side,
        contracts: Decimal,
        proceeds: Decimal,
    ) -> Result<Decimal> {
        let position = self
            .positions
            .get_mut(market_id)
            .ok_or_else(|| HedgeError::UnknownMarket(market_id.to_string()))?;
        if position.locked {
            return Err(HedgeError::PositionLocked(market_id.to_string()));
        }
        let held = position.qty(side);
        if contracts <= Decimal::ZERO || contracts > held {
            return Err(HedgeError::Validation(format!(
                "cannot sell {} {} contracts of {} held",
                contracts, side, held
            )));
        }

        let cost = position.cost(side) * contracts / held;
        let realized_pnl = proceeds - cost;
        match side {
            Side::Yes => {
                position.yes_qty -= contracts;
                position.yes_cost -= cost;
            }
            Side::No => {
                position.no_qty -= contracts;
                position.no_cost -= cost;
            }
        }
        position.realized_pnl += realized_pnl;
        position.updated_at = Utc::now();

        info!(
            market = market_id,
            %side,
            %contracts,
            pnl = %realized_pnl.round_dp(2),
            "hedge leg sold"
        );

        if position.is_empty() {
            if let Some(position) = self.positions.remove(market_id) {
                self.closed.push(ClosedPosition {
                    realized_pnl: position.realized_pnl,
                    position,
                    outcome: None,
                    closed_at: Utc::now(),
                });
            }
        }
        Ok(realized_pnl)
    }

    pub fn stats(&self) -> TrackerStats {
        let realized_profit: Decimal = self
            .closed
            .iter()
            .map(|c| c.realized_pnl)
            .chain(self.positions.values().map(|p| p.realized_pnl))
            .sum();
        let locked: Vec<&ArbPosition> = self.positions.values().filter(|p| p.locked).collect();
        let locked_profit: Decimal = locked.iter().map(|p| p.guaranteed_profit()).sum();

        TrackerStats {
            open_positions: self.positions.len(),
            locked_positions: locked.len(),
            closed_positions: self.closed.len(),
            total_trades: self.total_trades,
            realized_profit,
            locked_profit,
            total_pnl: realized_profit + locked_profit,
        }
    }
}

fn valid_price(price: Decimal) -> bool {
    price > Decimal::ZERO && price < Decimal::ONE
}
