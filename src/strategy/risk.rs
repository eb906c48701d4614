use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::config::TradingConfig;
use crate::domain::{Side, TargetSide, TradeRequest};

/// Trades above this share of the max amount need a confident signal
const LARGE_TRADE_RATIO: Decimal = dec!(0.5);
const LARGE_TRADE_MIN_CONFIDENCE: f64 = 0.6;

/// Limits enforced by the risk gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_trade_amount: Decimal,
    pub min_trade_amount: Decimal,
    pub max_daily_loss: Decimal,
    pub daily_trade_limit: u32,
    pub max_open_positions: usize,
    pub max_single_position: Decimal,
    pub stop_loss_percent: Decimal,
    pub take_profit_percent: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self::from(&TradingConfig::default())
    }
}

impl From<&TradingConfig> for RiskLimits {
    fn from(t: &TradingConfig) -> Self {
        Self {
            max_trade_amount: t.max_trade_amount,
            min_trade_amount: t.min_trade_amount,
            max_daily_loss: t.max_daily_loss,
            daily_trade_limit: t.daily_trade_limit,
            max_open_positions: t.max_open_positions,
            max_single_position: t.max_single_position,
            stop_loss_percent: t.stop_loss_percent,
            take_profit_percent: t.take_profit_percent,
        }
    }
}

/// Risk level derived from the day's pnl
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Classify by loss relative to the daily limit (25% / 50% / 80%)
    pub fn classify(daily_pnl: Decimal, max_daily_loss: Decimal) -> Self {
        if daily_pnl < -max_daily_loss * dec!(0.8) {
            RiskLevel::Critical
        } else if daily_pnl < -max_daily_loss * dec!(0.5) {
            RiskLevel::High
        } else if daily_pnl < -max_daily_loss * dec!(0.25) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exposure held in one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPosition {
    pub side: TargetSide,
    /// Dollars committed
    pub amount: Decimal,
    pub yes_contracts: Decimal,
    pub no_contracts: Decimal,
    /// Dollars committed per leg
    pub yes_cost: Decimal,
    pub no_cost: Decimal,
    /// Dollars per contract across both legs
    pub avg_price: Decimal,
    pub opened_at: DateTime<Utc>,
}

impl RiskPosition {
    pub fn contracts(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes_contracts,
            Side::No => self.no_contracts,
        }
    }

    pub fn cost(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes_cost,
            Side::No => self.no_cost,
        }
    }

    fn refresh_avg(&mut self) {
        let total_contracts = self.yes_contracts + self.no_contracts;
        self.avg_price = if total_contracts.is_zero() {
            Decimal::ZERO
        } else {
            self.amount / total_contracts
        };
    }
}

/// Daily risk state; replaced as a whole on day roll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub date: NaiveDate,
    pub daily_pnl: Decimal,
    pub daily_trades: u32,
    pub daily_high_water: Decimal,
    pub positions: HashMap<String, RiskPosition>,
}

impl RiskState {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            daily_pnl: Decimal::ZERO,
            daily_trades: 0,
            daily_high_water: Decimal::ZERO,
            positions: HashMap::new(),
        }
    }

    pub fn total_exposure(&self) -> Decimal {
        self.positions.values().map(|p| p.amount).sum()
    }
}

/// Outcome of `assess_risk`; a rejection is not an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub approved: bool,
    pub reason: String,
}

impl RiskDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: "Approved".to_string(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub daily_pnl: Decimal,
    pub daily_trades: u32,
    pub daily_high_water: Decimal,
    pub open_positions: usize,
    pub total_exposure: Decimal,
    pub max_position: Decimal,
    pub risk_level: RiskLevel,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub pnl: Decimal,
    pub trades: u32,
    pub high_water: Decimal,
    pub positions_open: usize,
    /// "active" or "stopped"
    pub status: String,
}

/// Pre-trade approval and daily loss / exposure tracking
#[derive(Debug)]
pub struct RiskGate {
    limits: RiskLimits,
    state: RiskState,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Self {
        Self::with_date(limits, Utc::now().date_naive())
    }

    pub fn with_date(limits: RiskLimits, date: NaiveDate) -> Self {
        Self {
            limits,
            state: RiskState::new(date),
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn position(&self, market_id: &str) -> Option<&RiskPosition> {
        self.state.positions.get(market_id)
    }

    /// Start a new day if the date changed. Daily counters are cleared in one
    /// assignment; open positions carry over.
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        if today == self.state.date {
            return false;
        }

        info!(
            from = %self.state.date,
            to = %today,
            pnl = %self.state.daily_pnl,
            trades = self.state.daily_trades,
            "Resetting daily risk counters"
        );

        let positions = std::mem::take(&mut self.state.positions);
        self.state = RiskState {
            positions,
            ..RiskState::new(today)
        };
        true
    }

    /// Check a trade against limits, first failure wins. Never mutates state.
    pub fn assess_risk(&self, request: &TradeRequest) -> RiskDecision {
        let limits = &self.limits;
        let state = &self.state;

        if state.daily_pnl < -limits.max_daily_loss {
            return RiskDecision::reject(format!(
                "Daily loss limit reached (${})",
                limits.max_daily_loss
            ));
        }

        if state.daily_trades >= limits.daily_trade_limit {
            return RiskDecision::reject(format!(
                "Daily trade limit reached ({})",
                limits.daily_trade_limit
            ));
        }

        let exposure = state.total_exposure();
        if exposure + request.amount > limits.max_single_position {
            return RiskDecision::reject(format!(
                "Position limit would be exceeded: exposure ${} + ${} > ${}",
                exposure.round_dp(2),
                request.amount.round_dp(2),
                limits.max_single_position
            ));
        }

        // Adding to an existing market does not open a new position
        if !state.positions.contains_key(&request.market_id)
            && state.positions.len() >= limits.max_open_positions
        {
            return RiskDecision::reject(format!(
                "Max open positions reached ({})",
                limits.max_open_positions
            ));
        }

        if request.amount > limits.max_trade_amount {
            return RiskDecision::reject(format!(
                "Trade amount ${} exceeds max ${}",
                request.amount, limits.max_trade_amount
            ));
        }

        if request.amount < limits.min_trade_amount {
            return RiskDecision::reject(format!(
                "Trade amount ${} below minimum ${}",
                request.amount, limits.min_trade_amount
            ));
        }

        if request.amount > limits.max_trade_amount * LARGE_TRADE_RATIO
            && request.signal_confidence < LARGE_TRADE_MIN_CONFIDENCE
        {
            return RiskDecision::reject(format!(
                "Low confidence ({:.0}%) for large trade",
                request.signal_confidence * 100.0
            ));
        }

        RiskDecision::approve()
    }

    /// Record a fill: count the trade, book realized pnl and grow the position
    pub fn update_position(
        &mut self,
        market_id: &str,
        side: Side,
        amount: Decimal,
        price: Decimal,
        realized_pnl: Decimal,
    ) {
        self.state.daily_trades += 1;
        self.record_pnl(realized_pnl);

        let contracts = if price.is_zero() {
            Decimal::ZERO
        } else {
            amount / price
        };

        let position = self
            .state
            .positions
            .entry(market_id.to_string())
            .or_insert_with(|| RiskPosition {
                side: side.into(),
                amount: Decimal::ZERO,
                yes_contracts: Decimal::ZERO,
                no_contracts: Decimal::ZERO,
                yes_cost: Decimal::ZERO,
                no_cost: Decimal::ZERO,
                avg_price: Decimal::ZERO,
                opened_at: Utc::now(),
            });

        position.side = position.side.merge(side);
        position.amount += amount;
        match side {
            Side::Yes => {
                position.yes_contracts += contracts;
                position.yes_cost += amount;
            }
            Side::No => {
                position.no_contracts += contracts;
                position.no_cost += amount;
            }
        }
        position.refresh_avg();
    }

    /// Record a filled sell of `contracts` on one leg. Books `proceeds` minus
    /// the leg's pro-rata cost as realized pnl and returns it; the position is
    /// removed once both legs are empty.
    pub fn reduce_position(
        &mut self,
        market_id: &str,
        side: Side,
        contracts: Decimal,
        proceeds: Decimal,
    ) -> Option<Decimal> {
        let position = self.state.positions.get_mut(market_id)?;
        let held = position.contracts(side);
        if held.is_zero() {
            return None;
        }

        let sold = contracts.min(held);
        let cost = position.cost(side) * sold / held;
        match side {
            Side::Yes => {
                position.yes_contracts -= sold;
                position.yes_cost -= cost;
            }
            Side::No => {
                position.no_contracts -= sold;
                position.no_cost -= cost;
            }
        }
        position.amount -= cost;
        position.refresh_avg();
        if position.yes_contracts.is_zero() {
            position.side = TargetSide::No;
        } else if position.no_contracts.is_zero() {
            position.side = TargetSide::Yes;
        }

        let emptied = position.yes_contracts.is_zero() && position.no_contracts.is_zero();
        if emptied {
            self.state.positions.remove(market_id);
        }

        let realized_pnl = proceeds - cost;
        self.record_pnl(realized_pnl);
        info!(
            market = market_id,
            %side,
            contracts = %sold,
            pnl = %realized_pnl.round_dp(2),
            closed = emptied,
            "risk position reduced"
        );
        Some(realized_pnl)
    }

    /// Book realized pnl outside of a fill (resolution, liquidation)
    pub fn record_pnl(&mut self, realized_pnl: Decimal) {
        self.state.daily_pnl += realized_pnl;
        if self.state.daily_pnl > self.state.daily_high_water {
            self.state.daily_high_water = self.state.daily_pnl;
        }
        if self.state.daily_pnl < -self.limits.max_daily_loss {
            error!(
                pnl = %self.state.daily_pnl,
                limit = %self.limits.max_daily_loss,
                "Daily loss limit breached"
            );
        }
    }

    /// Remove a position and book its realized pnl
    pub fn close_position(
        &mut self,
        market_id: &str,
        realized_pnl: Decimal,
    ) -> Option<RiskPosition> {
        let position = self.state.positions.remove(market_id)?;
        self.record_pnl(realized_pnl);
        info!(
            market = market_id,
            pnl = %realized_pnl.round_dp(2),
            daily_pnl = %self.state.daily_pnl.round_dp(2),
            "risk position closed"
        );
        Some(position)
    }

    /// Marked value minus dollars committed
    pub fn unrealized_pnl(
        &self,
        market_id: &str,
        yes_price: Decimal,
        no_price: Decimal,
    ) -> Decimal {
        self.state
            .positions
            .get(market_id)
            .map(|p| p.yes_contracts * yes_price + p.no_contracts * no_price - p.amount)
            .unwrap_or_default()
    }

    /// Stop-loss / take-profit on the position's marked value, both legs
    /// included. Callers route markets held in the hedge book elsewhere.
    pub fn should_close_position(
        &self,
        market_id: &str,
        yes_price: Decimal,
        no_price: Decimal,
    ) -> Option<ExitReason> {
        let position = self.state.positions.get(market_id)?;
        if position.amount.is_zero() {
            return None;
        }

        let unrealized = self.unrealized_pnl(market_id, yes_price, no_price);
        if unrealized < -position.amount * self.limits.stop_loss_percent {
            warn!(market = market_id, %unrealized, "Stop-loss triggered");
            Some(ExitReason::StopLoss)
        } else if unrealized > position.amount * self.limits.take_profit_percent {
            info!(market = market_id, %unrealized, "Take-profit triggered");
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }

    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::classify(self.state.daily_pnl, self.limits.max_daily_loss)
    }

    /// Snapshot of current risk; pure
    pub fn get_metrics(&self) -> RiskMetrics {
        let state = &self.state;
        let limits = &self.limits;

        let mut warnings = Vec::new();
        if state.daily_pnl < -limits.max_daily_loss * dec!(0.7) {
            warnings.push("Approaching daily loss limit".to_string());
        }
        if Decimal::from(state.positions.len() as u64)
            >= Decimal::from(limits.max_open_positions as u64) * dec!(0.8)
        {
            warnings.push("Approaching position limit".to_string());
        }
        if Decimal::from(state.daily_trades) >= Decimal::from(limits.daily_trade_limit) * dec!(0.8)
        {
            warnings.push("Approaching daily trade limit".to_string());
        }

        RiskMetrics {
            daily_pnl: state.daily_pnl,
            daily_trades: state.daily_trades,
            daily_high_water: state.daily_high_water,
            open_positions: state.positions.len(),
            total_exposure: state.total_exposure(),
            max_position: state
                .positions
                .values()
                .map(|p| p.amount)
                .max()
                .unwrap_or_default(),
            risk_level: self.risk_level(),
            warnings,
        }
    }

    pub fn daily_summary(&self) -> DailySummary {
        let active = self.state.daily_pnl > -self.limits.max_daily_loss;
        DailySummary {
            date: self.state.date,
            pnl: self.state.daily_pnl,
            trades: self.state.daily_trades,
            high_water: self.state.daily_high_water,
            positions_open: self.state.positions.len(),
            status: if active { "active" } else { "stopped" }.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalType;

    fn gate() -> RiskGate {
        RiskGate::new(RiskLimits::default())
    }

    fn request(amount: Decimal, confidence: f64) -> TradeRequest {
        TradeRequest::new(
            "m1",
            Side::Yes,
            amount,
            dec!(0.40),
            SignalType::Momentum,
            confidence,
        )
    }

    #[test]
    fn test_amount_above_max_rejected() {
        let gate = gate();

        let decision = gate.assess_risk(&request(dec!(30), 0.9));
        assert!(!decision.approved);
        assert!(decision.reason.contains("30"));
        assert!(decision.reason.contains("25"));

        assert!(gate.assess_risk(&request(dec!(20), 0.9)).approved);
    }

    #[test]
    fn test_daily_loss_breach_rejects_everything() {
        let mut gate = gate();
        gate.record_pnl(dec!(-100.01));

        for amount in [dec!(1), dec!(5), dec!(20)] {
            let decision = gate.assess_risk(&request(amount, 0.99));
            assert!(!decision.approved);
            assert!(decision.reason.contains("Daily loss limit"));
        }
        assert_eq!(gate.risk_level(), RiskLevel::Critical);
        assert_eq!(gate.daily_summary().status, "stopped");
    }

    #[test]
    fn test_loss_at_limit_still_trades() {
        let mut gate = gate();
        gate.record_pnl(dec!(-100));
        assert!(gate.assess_risk(&request(dec!(5), 0.5)).approved);
    }

    #[test]
    fn test_large_trade_needs_confidence() {
        let gate = gate();
        let decision = gate.assess_risk(&request(dec!(15), 0.5));
        assert!(!decision.approved);
        assert!(decision.reason.contains("Low confidence"));

        assert!(gate.assess_risk(&request(dec!(15), 0.6)).approved);
        assert!(gate.assess_risk(&request(dec!(10), 0.1)).approved);
    }

    #[test]
    fn test_below_minimum_rejected() {
        let decision = gate().assess_risk(&request(dec!(0.5), 0.9));
        assert!(!decision.approved);
        assert!(decision.reason.contains("below minimum"));
    }

    #[test]
    fn test_trade_limit() {
        let mut gate = RiskGate::new(RiskLimits {
            daily_trade_limit: 2,
            ..RiskLimits::default()
        });
        gate.update_position("m1", Side::Yes, dec!(2), dec!(0.5), Decimal::ZERO);
        gate.update_position("m1", Side::Yes, dec!(2), dec!(0.5), Decimal::ZERO);

        let decision = gate.assess_risk(&request(dec!(2), 0.9));
        assert!(!decision.approved);
        assert!(decision.reason.contains("trade limit"));
    }

    #[test]
    fn test_exposure_and_position_count() {
        let mut gate = RiskGate::new(RiskLimits {
            max_open_positions: 2,
            ..RiskLimits::default()
        });
        gate.update_position("a", Side::Yes, dec!(20), dec!(0.5), Decimal::ZERO);
        gate.update_position("b", Side::No, dec!(20), dec!(0.5), Decimal::ZERO);

        // New market blocked by count, existing market still allowed
        let mut new_market = request(dec!(5), 0.9);
        new_market.market_id = "c".to_string();
        assert!(gate.assess_risk(&new_market).reason.contains("Max open positions"));

        let mut existing = request(dec!(5), 0.9);
        existing.market_id = "a".to_string();
        assert!(gate.assess_risk(&existing).approved);

        gate.update_position("a", Side::No, dec!(25), dec!(0.5), Decimal::ZERO);
        gate.update_position("b", Side::No, dec!(25), dec!(0.5), Decimal::ZERO);
        // 90 committed, 20 more would pass 100
        let mut big = request(dec!(20), 0.9);
        big.market_id = "a".to_string();
        let decision = gate.assess_risk(&big);
        assert!(!decision.approved);
        assert!(decision.reason.contains("Position limit"));
    }

    #[test]
    fn test_check_order_short_circuits() {
        let mut gate = gate();
        gate.record_pnl(dec!(-150));
        // Also oversized, but the loss check runs first
        let decision = gate.assess_risk(&request(dec!(30), 0.1));
        assert!(decision.reason.contains("Daily loss limit"));
    }

    #[test]
    fn test_assess_does_not_mutate() {
        let gate = gate();
        let before = gate.state().clone();
        gate.assess_risk(&request(dec!(20), 0.9));
        assert_eq!(&before, gate.state());
    }

    #[test]
    fn test_update_position_tracks_sides() {
        let mut gate = gate();
        gate.update_position("m1", Side::Yes, dec!(10), dec!(0.40), Decimal::ZERO);
        assert_eq!(gate.position("m1").unwrap().side, TargetSide::Yes);

        gate.update_position("m1", Side::No, dec!(15), dec!(0.50), dec!(2));
        let position = gate.position("m1").unwrap();
        assert_eq!(position.side, TargetSide::Both);
        assert_eq!(position.amount, dec!(25));
        assert_eq!(position.yes_contracts, dec!(25));
        assert_eq!(position.no_contracts, dec!(30));
        assert_eq!(gate.state().daily_trades, 2);
        assert_eq!(gate.state().daily_pnl, dec!(2));
        assert_eq!(gate.state().daily_high_water, dec!(2));
    }

    #[test]
    fn test_metrics_idempotent() {
        let mut gate = gate();
        gate.update_position("m1", Side::Yes, dec!(10), dec!(0.40), dec!(-30));

        let first = gate.get_metrics();
        let second = gate.get_metrics();
        assert_eq!(first, second);
        assert_eq!(first.risk_level, RiskLevel::Medium);
        assert_eq!(first.total_exposure, dec!(10));
    }

    #[test]
    fn test_risk_level_thresholds() {
        let max = dec!(100);
        assert_eq!(RiskLevel::classify(dec!(0), max), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(dec!(-25), max), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(dec!(-26), max), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(dec!(-51), max), RiskLevel::High);
        assert_eq!(RiskLevel::classify(dec!(-80.5), max), RiskLevel::Critical);
        assert!(RiskLevel::Critical > RiskLevel::High);
    }

    #[test]
    fn test_warnings() {
        let mut gate = RiskGate::new(RiskLimits {
            daily_trade_limit: 5,
            ..RiskLimits::default()
        });
        for _ in 0..4 {
            gate.update_position("m1", Side::Yes, dec!(1), dec!(0.5), Decimal::ZERO);
        }
        gate.record_pnl(dec!(-75));

        let warnings = gate.get_metrics().warnings;
        assert!(warnings.contains(&"Approaching daily loss limit".to_string()));
        assert!(warnings.contains(&"Approaching daily trade limit".to_string()));
        assert!(!warnings.contains(&"Approaching position limit".to_string()));
    }

    #[test]
    fn test_stop_loss_and_take_profit() {
        let mut gate = gate();
        gate.update_position("m1", Side::Yes, dec!(10), dec!(0.40), Decimal::ZERO);

        assert_eq!(gate.should_close_position("m1", dec!(0.38), dec!(0.62)), None);
        // 25 contracts at 0.28 = 7 value: -30%
        assert_eq!(
            gate.should_close_position("m1", dec!(0.28), dec!(0.72)),
            Some(ExitReason::StopLoss)
        );
        // 25 at 0.64 = 16 value: +60%
        assert_eq!(
            gate.should_close_position("m1", dec!(0.64), dec!(0.36)),
            Some(ExitReason::TakeProfit)
        );

        gate.update_position("m1", Side::No, dec!(10), dec!(0.60), Decimal::ZERO);
        assert_eq!(gate.should_close_position("m1", dec!(0.10), dec!(0.90)), None);
    }

    #[test]
    fn test_close_position_books_pnl() {
        let mut gate = gate();
        gate.update_position("m1", Side::Yes, dec!(10), dec!(0.40), Decimal::ZERO);
        let closed = gate.close_position("m1", dec!(15)).unwrap();
        assert_eq!(closed.amount, dec!(10));
        assert!(gate.position("m1").is_none());
        assert_eq!(gate.state().daily_pnl, dec!(15));
        assert_eq!(gate.state().daily_trades, 1);
        assert!(gate.close_position("m1", dec!(1)).is_none());
    }

    #[test]
    fn test_roll_day_resets_counters_keeps_positions() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let mut gate = RiskGate::with_date(RiskLimits::default(), day);
        gate.update_position("m1", Side::Yes, dec!(10), dec!(0.40), dec!(-90));
        assert_eq!(gate.risk_level(), RiskLevel::Critical);

        assert!(!gate.roll_day(day));
        assert_eq!(gate.state().daily_trades, 1);

        let next = day.succ_opt().unwrap();
        assert!(gate.roll_day(next));
        let state = gate.state();
        assert_eq!(state.date, next);
        assert_eq!(state.daily_pnl, Decimal::ZERO);
        assert_eq!(state.daily_trades, 0);
        assert_eq!(state.daily_high_water, Decimal::ZERO);
        assert!(state.positions.contains_key("m1"));
        assert_eq!(gate.risk_level(), RiskLevel::Low);
    }

    #[test]
    fn test_mixed_directional_position_keeps_exit_protection() {
        let mut gate = gate();
        gate.update_position("m1", Side::Yes, dec!(10), dec!(0.40), Decimal::ZERO);
        gate.update_position("m1", Side::No, dec!(10), dec!(0.50), Decimal::ZERO);
        assert_eq!(gate.position("m1").unwrap().side, TargetSide::Both);

        // 25 YES at 0.10 plus 20 NO at 0.30 = 8.5 on 20 committed
        assert_eq!(
            gate.should_close_position("m1", dec!(0.10), dec!(0.30)),
            Some(ExitReason::StopLoss)
        );
    }

    #[test]
    fn test_reduce_position_per_leg() {
        let mut gate = gate();
        gate.update_position("m1", Side::Yes, dec!(5), dec!(0.50), Decimal::ZERO);
        gate.update_position("m1", Side::No, dec!(6), dec!(0.60), Decimal::ZERO);

        let pnl = gate.reduce_position("m1", Side::Yes, dec!(10), dec!(3)).unwrap();
        assert_eq!(pnl, dec!(-2));
        let position = gate.position("m1").unwrap();
        assert_eq!(position.yes_contracts, Decimal::ZERO);
        assert_eq!(position.amount, dec!(6));
        assert_eq!(position.side, TargetSide::No);
        assert_eq!(gate.state().daily_pnl, dec!(-2));
        // Sells are not trades against the daily limit
        assert_eq!(gate.state().daily_trades, 2);

        assert!(gate.reduce_position("m1", Side::Yes, dec!(10), dec!(3)).is_none());

        let pnl = gate.reduce_position("m1", Side::No, dec!(10), dec!(4)).unwrap();
        assert_eq!(pnl, dec!(-2));
        assert!(gate.position("m1").is_none());
        assert_eq!(gate.state().daily_pnl, dec!(-4));
    }
}
