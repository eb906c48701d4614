//! Execution Orchestrator
//!
//! Drives the poll → signal → gate → execute cycle over the configured
//! watchlist. All position and risk state is owned here and mutated only from
//! this task; the only suspension points are venue calls, each bounded by a
//! per-call timeout that fails closed.

use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use super::hedge_tracker::{ArbitragePositionTracker, BuyDecision, TrackerConfig};
use super::risk::{RiskGate, RiskLevel, RiskLimits};
use super::signal::SignalGenerator;
use crate::config::{AppConfig, WatchlistEntry};
use crate::coordination::StopHandle;
use crate::domain::{
    EngineState, MarketSnapshot, OrderRequest, Side, SignalType, TargetSide, TradeRequest,
    TradingSignal, WhaleTrade,
};
use crate::error::{HedgeError, Result};
use crate::exchange::{call_with_timeout, ExecutionClient, MarketDataFeed};
use crate::services::{
    ErrorTally, LogRecord, OutcomeRecord, SignalLog, SignalRecord, StatusSnapshot, StatusWriter,
};

/// Source tag for hedge legs proposed by the position tracker
pub const HEDGE_SOURCE: &str = "mechanical_arb";
const HEDGE_CONFIDENCE: f64 = 0.95;
/// Contract-count slack when comparing venue and book positions
const RECONCILE_TOLERANCE: Decimal = dec!(0.0001);

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub min_signal_confidence: f64,
    pub force_close_on_halt: bool,
    pub max_trade_amount: Decimal,
    pub min_trade_amount: Decimal,
    pub whale_min_amount: Decimal,
}

impl From<&AppConfig> for OrchestratorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.engine.poll_interval_secs),
            request_timeout: Duration::from_millis(config.engine.request_timeout_ms),
            min_signal_confidence: config.engine.min_signal_confidence,
            force_close_on_halt: config.engine.force_close_on_halt,
            max_trade_amount: config.trading.max_trade_amount,
            min_trade_amount: config.trading.min_trade_amount,
            whale_min_amount: config.trading.whale_min_amount,
        }
    }
}

/// What happened during one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub markets_polled: usize,
    pub markets_skipped: usize,
    pub signals: usize,
    pub executed: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
    pub resolved: usize,
    pub exits: usize,
    pub halted: bool,
}

/// Result of pushing one trade request through gate and venue
#[derive(Debug, Clone, PartialEq, Eq)]
enum Submission {
    Filled,
    /// Not attempted (balance)
    Skipped(String),
    /// Risk gate said no
    Rejected(String),
    /// Venue refused or the call failed
    Failed(String),
}

pub struct ExecutionOrchestrator {
    config: OrchestratorConfig,
    watchlist: Vec<WatchlistEntry>,
    tracker: ArbitragePositionTracker,
    gate: RiskGate,
    generator: SignalGenerator,
    execution_feed: Arc<dyn MarketDataFeed>,
    reference_feed: Option<Arc<dyn MarketDataFeed>>,
    executor: Arc<dyn ExecutionClient>,
    signal_log: Option<SignalLog>,
    status: Option<StatusWriter>,
    state: EngineState,
    errors: ErrorTally,
    cycles: u64,
    /// Realized pnl of every closed position since start
    realized_pnl: Decimal,
    /// (signal type, source) of every fill per open market, for outcome attribution
    origins: HashMap<String, Vec<(SignalType, String)>>,
}

impl ExecutionOrchestrator {
    pub fn new(
        config: &AppConfig,
        execution_feed: Arc<dyn MarketDataFeed>,
        executor: Arc<dyn ExecutionClient>,
    ) -> Self {
        Self {
            config: OrchestratorConfig::from(config),
            watchlist: config.watchlist.clone(),
            tracker: ArbitragePositionTracker::new(TrackerConfig::from(&config.trading)),
            gate: RiskGate::new(RiskLimits::from(&config.trading)),
            generator: SignalGenerator::from_config(&config.trading, &config.engine),
            execution_feed,
            reference_feed: None,
            executor,
            signal_log: None,
            status: None,
            state: EngineState::Idle,
            errors: ErrorTally::default(),
            cycles: 0,
            realized_pnl: Decimal::ZERO,
            origins: HashMap::new(),
        }
    }

    /// Venue whose prices lead the execution venue (momentum, whale prints)
    pub fn with_reference_feed(mut self, feed: Arc<dyn MarketDataFeed>) -> Self {
        self.reference_feed = Some(feed);
        self
    }

    pub fn with_signal_log(mut self, log: SignalLog) -> Self {
        self.signal_log = Some(log);
        self
    }

    pub fn with_status_writer(mut self, writer: StatusWriter) -> Self {
        self.status = Some(writer);
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn tracker(&self) -> &ArbitragePositionTracker {
        &self.tracker
    }

    pub fn gate(&self) -> &RiskGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut RiskGate {
        &mut self.gate
    }

    pub fn errors(&self) -> &ErrorTally {
        &self.errors
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn transition(&mut self, to: EngineState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(HedgeError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        trace!(from = %self.state, to = %to, "state transition");
        self.state = to;
        Ok(())
    }

    /// Poll until halted or stopped. A stop is honored between cycles only.
    pub async fn run(&mut self, stop: StopHandle) -> Result<()> {
        info!(
            markets = self.watchlist.len(),
            venue = %self.execution_feed.venue(),
            dry_run = self.executor.is_dry_run(),
            interval_secs = self.config.poll_interval.as_secs(),
            "orchestrator starting"
        );

        if let Err(e) = self.reconcile().await {
            warn!(error = %e, "startup reconciliation failed");
            self.errors.record(e.kind());
        }

        loop {
            if stop.is_stop_requested() {
                break;
            }

            if let Err(e) = self.run_cycle().await {
                error!(error = %e, kind = %e.kind(), "cycle aborted; halting");
                self.errors.record(e.kind());
                self.state = EngineState::Halted;
                self.publish(Vec::new()).await;
                return Err(e);
            }

            if self.state.is_halted() {
                error!("engine HALTED by risk breaker; manual restart required");
                return Ok(());
            }

            tokio::select! {
                _ = sleep(self.config.poll_interval) => {}
                _ = stop.stopped() => {}
            }
        }

        info!(cycles = self.cycles, "stop requested; halting at cycle boundary");
        self.transition(EngineState::Halted)?;
        self.publish(Vec::new()).await;
        Ok(())
    }

    /// One full poll cycle. Per-market and per-order failures are tallied and
    /// never abort the cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        if self.state.is_halted() {
            return Err(HedgeError::Halted(
                "critical risk level reached; restart required".to_string(),
            ));
        }

        self.transition(EngineState::Polling)?;
        self.cycles += 1;
        let mut report = CycleReport {
            cycle: self.cycles,
            ..CycleReport::default()
        };
        let mut records = Vec::new();

        self.gate.roll_day(Utc::now().date_naive());

        // No orders without a known balance
        let executor = Arc::clone(&self.executor);
        let mut budget = match call_with_timeout(
            "get_balance",
            self.config.request_timeout,
            executor.get_balance(),
        )
        .await
        {
            Ok(balance) => Some(balance.available),
            Err(e) => {
                warn!(error = %e, "balance unavailable; no orders this cycle");
                self.errors.record(e.kind());
                None
            }
        };

        let snapshots = self.poll_markets(&mut report, &mut records).await;
        let whales = self.poll_whales().await;

        if let Some(available) = budget.as_mut() {
            for snapshot in &snapshots {
                let Some(reason) = self.exit_due(snapshot) else {
                    continue;
                };
                if let Some((outcome, closed)) = self.exit_market(snapshot, reason, available).await
                {
                    report.exits += usize::from(closed);
                    records.push(LogRecord::Outcome(outcome));
                }
            }
        }

        let (signals, hedges) = self.collect_signals(&snapshots, &whales);
        report.signals = signals.len();
        let by_market: HashMap<&str, &MarketSnapshot> = snapshots
            .iter()
            .map(|s| (s.market_id.as_str(), s))
            .collect();

        for signal in &signals {
            let record = match budget.as_mut() {
                Some(available) => {
                    self.act_on_signal(signal, &hedges, &by_market, available, &mut report)
                        .await?
                }
                None => SignalRecord::from_signal(signal).with_note("balance unavailable"),
            };
            records.push(LogRecord::Signal(record));
        }

        let metrics = self.gate.get_metrics();
        if metrics.risk_level == RiskLevel::Critical {
            self.transition(EngineState::Halted)?;
            report.halted = true;
            error!(
                daily_pnl = %metrics.daily_pnl.round_dp(2),
                limit = %self.gate.limits().max_daily_loss,
                "CRITICAL risk level; trading halted"
            );
            if self.config.force_close_on_halt {
                let mut proceeds = Decimal::ZERO;
                for snapshot in &snapshots {
                    if !self.liquidation_due(snapshot) {
                        continue;
                    }
                    if let Some((outcome, closed)) = self
                        .exit_market(snapshot, "halt_liquidation", &mut proceeds)
                        .await
                    {
                        report.exits += usize::from(closed);
                        records.push(LogRecord::Outcome(outcome));
                    }
                }
            }
        } else {
            for warning in &metrics.warnings {
                warn!(level = %metrics.risk_level, "{}", warning);
            }
            self.transition(EngineState::Idle)?;
        }

        self.publish(records).await;

        info!(
            cycle = report.cycle,
            markets = report.markets_polled,
            signals = report.signals,
            executed = report.executed,
            rejected = report.rejected,
            failed = report.failed,
            daily_pnl = %metrics.daily_pnl.round_dp(2),
            risk = %metrics.risk_level,
            "cycle complete"
        );
        Ok(report)
    }

    /// Fetch and validate quotes; settle resolved markets on the way
    async fn poll_markets(
        &mut self,
        report: &mut CycleReport,
        records: &mut Vec<LogRecord>,
    ) -> Vec<MarketSnapshot> {
        let feed = Arc::clone(&self.execution_feed);
        let reference = self.reference_feed.clone();
        let timeout = self.config.request_timeout;
        let mut snapshots = Vec::with_capacity(self.watchlist.len());

        for entry in self.watchlist.clone() {
            let market = entry.market_id.as_str();
            let quote = match call_with_timeout(
                &format!("get_quote({})", market),
                timeout,
                feed.get_quote(market),
            )
            .await
            {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(market, error = %e, "quote fetch failed; skipping market");
                    self.errors.record(e.kind());
                    report.markets_skipped += 1;
                    continue;
                }
            };

            if let Some(outcome) = quote.resolved {
                if let Some(record) = self.settle(market, outcome) {
                    report.resolved += 1;
                    records.push(LogRecord::Outcome(record));
                }
                continue;
            }

            let mut snapshot = match quote.validate() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(market, error = %e, "excluding market this cycle");
                    self.errors.record(e.kind());
                    report.markets_skipped += 1;
                    continue;
                }
            };

            if let (Some(reference), Some(reference_id)) = (&reference, &entry.reference_id) {
                let fetched = call_with_timeout(
                    &format!("get_quote({})", reference_id),
                    timeout,
                    reference.get_quote(reference_id),
                )
                .await
                .and_then(|q| q.validate());
                match fetched {
                    Ok(linked) => snapshot.reference_yes = Some(linked.yes_price),
                    Err(e) => {
                        debug!(market, reference = %reference_id, error = %e, "no reference price");
                        self.errors.record(e.kind());
                    }
                }
            }

            debug!(
                market,
                yes = %snapshot.yes_price,
                no = %snapshot.no_price,
                reference = ?snapshot.reference_yes,
                "quote"
            );
            snapshots.push(snapshot);
        }

        report.markets_polled = snapshots.len();
        snapshots
    }

    /// Large reference-venue trades, keyed to the execution market they map to
    async fn poll_whales(&mut self) -> Vec<(WhaleTrade, String)> {
        let Some(reference) = self.reference_feed.clone() else {
            return Vec::new();
        };

        let trades = match call_with_timeout(
            "recent_large_trades",
            self.config.request_timeout,
            reference.recent_large_trades(self.config.whale_min_amount),
        )
        .await
        {
            Ok(trades) => trades,
            Err(e) => {
                warn!(error = %e, "whale feed unavailable");
                self.errors.record(e.kind());
                return Vec::new();
            }
        };

        trades
            .into_iter()
            .filter_map(|trade| {
                let market = self
                    .watchlist
                    .iter()
                    .find(|w| {
                        w.reference_id.as_deref() == Some(trade.market_id.as_str())
                            || w.market_id == trade.market_id
                    })?
                    .market_id
                    .clone();
                Some((trade, market))
            })
            .collect()
    }

    /// Close books for a settled market; pnl is booked into the daily total
    fn settle(&mut self, market_id: &str, outcome: Side) -> Option<OutcomeRecord> {
        let tracker_pnl = self.tracker.close_position(market_id, outcome);
        let gate_pnl = self
            .gate
            .position(market_id)
            .map(|p| p.contracts(outcome) - p.amount);
        let realized = gate_pnl.or(tracker_pnl)?;

        if gate_pnl.is_some() {
            self.gate.close_position(market_id, realized);
        } else {
            self.gate.record_pnl(realized);
        }
        self.realized_pnl += realized;

        info!(market = market_id, %outcome, pnl = %realized.round_dp(2), "market resolved");
        let origins = self.origins.remove(market_id).unwrap_or_default();
        let record = OutcomeRecord::new(market_id, Some(outcome), realized, "resolved");
        Some(record.attributed(&origins))
    }

    /// Exit reason for a market, if its position should be closed now
    fn exit_due(&self, snapshot: &MarketSnapshot) -> Option<&'static str> {
        let market = snapshot.market_id.as_str();
        if self.tracker.position(market).is_some() {
            self.tracker
                .should_exit(market, snapshot.yes_price, snapshot.no_price)
                .then_some("unhedged_exit")
        } else {
            self.gate
                .should_close_position(market, snapshot.yes_price, snapshot.no_price)
                .map(|reason| reason.as_str())
        }
    }

    /// Locked hedges are held to resolution even when halting
    fn liquidation_due(&self, snapshot: &MarketSnapshot) -> bool {
        let market = snapshot.market_id.as_str();
        match self.tracker.position(market) {
            Some(position) => !position.locked,
            None => self.gate.position(market).is_some(),
        }
    }

    /// Sell every held leg at current prices. Legs that fill are booked even
    /// when a later leg fails; whatever is left is retried next cycle. The flag
    /// is true once the market is fully closed.
    async fn exit_market(
        &mut self,
        snapshot: &MarketSnapshot,
        reason: &str,
        available: &mut Decimal,
    ) -> Option<(OutcomeRecord, bool)> {
        let market = snapshot.market_id.as_str();
        let hedged = self.tracker.position(market).is_some();
        let legs = match self.tracker.position(market) {
            Some(p) => [(Side::Yes, p.yes_qty), (Side::No, p.no_qty)],
            None => {
                let p = self.gate.position(market)?;
                [(Side::Yes, p.yes_contracts), (Side::No, p.no_contracts)]
            }
        };

        let (sold, complete) = self.sell_legs(snapshot, &legs, available).await;
        if sold.is_empty() {
            return None;
        }

        let mut realized = Decimal::ZERO;
        for (side, contracts, proceeds) in sold {
            let tracker_pnl = if hedged {
                match self.tracker.reduce_leg(market, side, contracts, proceeds) {
                    Ok(pnl) => Some(pnl),
                    Err(e) => {
                        warn!(market, %side, error = %e, "hedge book not reduced");
                        self.errors.record(e.kind());
                        None
                    }
                }
            } else {
                None
            };

            // The gate books the pnl; the tracker figure covers a missing gate entry
            let pnl = match self.gate.reduce_position(market, side, contracts, proceeds) {
                Some(pnl) => pnl,
                None => match tracker_pnl {
                    Some(pnl) => {
                        self.gate.record_pnl(pnl);
                        pnl
                    }
                    None => continue,
                },
            };
            realized += pnl;
        }
        self.realized_pnl += realized;

        let (origins, reason) = if complete {
            (self.origins.remove(market).unwrap_or_default(), reason.to_string())
        } else {
            warn!(market, pnl = %realized.round_dp(2), "exit partially filled");
            (
                self.origins.get(market).cloned().unwrap_or_default(),
                format!("{}_partial", reason),
            )
        };
        let record = OutcomeRecord::new(market, None, realized, reason).attributed(&origins);
        Some((record, complete))
    }

    /// Sells bypass the risk gate; they only ever reduce exposure. Returns the
    /// filled legs as (side, contracts, proceeds) and whether every leg filled.
    async fn sell_legs(
        &mut self,
        snapshot: &MarketSnapshot,
        legs: &[(Side, Decimal)],
        available: &mut Decimal,
    ) -> (Vec<(Side, Decimal, Decimal)>, bool) {
        let executor = Arc::clone(&self.executor);
        let mut sold = Vec::with_capacity(legs.len());
        for &(side, contracts) in legs {
            if contracts <= Decimal::ZERO {
                continue;
            }
            let price = snapshot.price(side);
            let order = OrderRequest::sell(snapshot.market_id.clone(), side, contracts * price, price);
            let result = call_with_timeout(
                &format!("place_order({})", snapshot.market_id),
                self.config.request_timeout,
                executor.place_order(&order),
            )
            .await;

            match result {
                Ok(ack) if ack.status.is_accepted() => {
                    *available += order.amount;
                    info!(market = %snapshot.market_id, %side, %contracts, %price, "leg sold");
                    sold.push((side, contracts, order.amount));
                }
                Ok(ack) => {
                    let e = HedgeError::OrderRejected(format!(
                        "exit {} {} returned {:?}",
                        snapshot.market_id, side, ack.status
                    ));
                    error!(market = %snapshot.market_id, %side, error = %e, "exit order refused");
                    self.errors.record(e.kind());
                    return (sold, false);
                }
                Err(e) => {
                    error!(market = %snapshot.market_id, %side, error = %e, "exit order failed");
                    self.errors.record(e.kind());
                    return (sold, false);
                }
            }
        }
        (sold, true)
    }

    /// Tracker hedge legs plus strategy signals, aggregated and filtered
    fn collect_signals(
        &mut self,
        snapshots: &[MarketSnapshot],
        whales: &[(WhaleTrade, String)],
    ) -> (Vec<TradingSignal>, HashMap<String, BuyDecision>) {
        let mut hedges = HashMap::new();
        let mut candidates = Vec::new();

        for snapshot in snapshots {
            let market = snapshot.market_id.as_str();
            // A market is either in the hedge book or held directionally
            if self.tracker.position(market).is_none() && self.gate.position(market).is_some() {
                continue;
            }
            if let Some(decision) =
                self.tracker
                    .analyze_market(snapshot.yes_price, snapshot.no_price, market)
            {
                candidates.push(
                    TradingSignal::new(
                        SignalType::Arbitrage,
                        market,
                        decision.side.into(),
                        HEDGE_CONFIDENCE,
                        decision.expected_profit,
                        HEDGE_SOURCE,
                    )
                    .with_meta("reason", decision.reason.as_str())
                    .with_meta("amount", decision.amount.to_string()),
                );
                hedges.insert(market.to_string(), decision);
            }
        }

        candidates.extend(self.generator.generate(snapshots, whales));
        let aggregated = SignalGenerator::aggregate(candidates);
        let mut signals =
            SignalGenerator::filter_by_confidence(aggregated, self.config.min_signal_confidence);

        // Pair buys open fresh hedges only; an open hedge follows the tracker
        let tracker = &self.tracker;
        let gate = &self.gate;
        let pair_markets: HashSet<String> = signals
            .iter()
            .filter(|s| s.side == TargetSide::Both)
            .map(|s| s.market_id.clone())
            .collect();
        signals.retain(|s| {
            let hedged = tracker.position(&s.market_id).is_some();
            if s.side == TargetSide::Both {
                !hedged && gate.position(&s.market_id).is_none()
            } else if s.source == HEDGE_SOURCE {
                hedged || !pair_markets.contains(&s.market_id)
            } else {
                true
            }
        });

        (signals, hedges)
    }

    /// Dollars for a directional buy, scaled by confidence
    fn directional_amount(&self, confidence: f64) -> Decimal {
        let scale = Decimal::from_f64(confidence).unwrap_or_default();
        (self.config.max_trade_amount * scale)
            .round_dp(2)
            .max(self.config.min_trade_amount)
    }

    /// Turn one signal into trade requests and push each through the gate
    async fn act_on_signal(
        &mut self,
        signal: &TradingSignal,
        hedges: &HashMap<String, BuyDecision>,
        snapshots: &HashMap<&str, &MarketSnapshot>,
        available: &mut Decimal,
        report: &mut CycleReport,
    ) -> Result<SignalRecord> {
        let mut record = SignalRecord::from_signal(signal);
        let market = signal.market_id.as_str();
        let Some(snapshot) = snapshots.get(market) else {
            return Ok(record.with_note("no quote this cycle"));
        };

        let hedge = if signal.source == HEDGE_SOURCE {
            hedges.get(market)
        } else {
            None
        };

        let plan: Vec<(TradeRequest, bool)> = match (hedge, signal.side) {
            (Some(decision), _) => vec![(
                TradeRequest::new(
                    market,
                    decision.side,
                    decision.amount,
                    snapshot.price(decision.side),
                    SignalType::Arbitrage,
                    signal.confidence,
                ),
                true,
            )],
            (None, TargetSide::Both) => {
                // Equal contracts on both legs
                let contracts = self.directional_amount(signal.confidence) / snapshot.pair_sum();
                TargetSide::Both
                    .legs()
                    .into_iter()
                    .map(|side| {
                        let price = snapshot.price(side);
                        let request = TradeRequest::new(
                            market,
                            side,
                            contracts * price,
                            price,
                            signal.signal_type,
                            signal.confidence,
                        );
                        (request, true)
                    })
                    .collect()
            }
            (None, target) => {
                if self.tracker.position(market).is_some() {
                    return Ok(record.with_note("hedge position open in market"));
                }
                let side = if target == TargetSide::Yes {
                    Side::Yes
                } else {
                    Side::No
                };
                vec![(
                    TradeRequest::new(
                        market,
                        side,
                        self.directional_amount(signal.confidence),
                        snapshot.price(side),
                        signal.signal_type,
                        signal.confidence,
                    ),
                    false,
                )]
            }
        };

        for (request, hedge_leg) in plan {
            let amount = request.amount;
            match self.submit(request, hedge_leg, available).await? {
                Submission::Filled => {
                    report.executed += 1;
                    record = record.executed(amount);
                    self.note_origin(signal);
                }
                Submission::Rejected(reason) => {
                    report.rejected += 1;
                    record = record.with_note(reason);
                    break;
                }
                Submission::Skipped(reason) => {
                    report.skipped += 1;
                    record = record.with_note(reason);
                    break;
                }
                Submission::Failed(reason) => {
                    report.failed += 1;
                    record = record.with_note(reason);
                    break;
                }
            }
        }

        Ok(record)
    }

    /// Gate, execute, then book: strictly in that order
    async fn submit(
        &mut self,
        request: TradeRequest,
        hedge_leg: bool,
        available: &mut Decimal,
    ) -> Result<Submission> {
        if request.amount > *available {
            debug!(
                market = %request.market_id,
                amount = %request.amount,
                available = %available,
                "skipping order: insufficient balance"
            );
            return Ok(Submission::Skipped(format!(
                "insufficient balance: ${} available",
                available.round_dp(2)
            )));
        }

        self.transition(EngineState::Gating)?;
        let decision = self.gate.assess_risk(&request);
        if !decision.approved {
            warn!(
                market = %request.market_id,
                side = %request.side,
                amount = %request.amount,
                strategy = %request.strategy,
                reason = %decision.reason,
                "trade rejected by risk gate"
            );
            self.errors.record_rejection();
            self.transition(EngineState::Polling)?;
            return Ok(Submission::Rejected(decision.reason));
        }

        self.transition(EngineState::Executing)?;
        let executor = Arc::clone(&self.executor);
        let order = request.to_order();
        let result = call_with_timeout(
            &format!("place_order({})", request.market_id),
            self.config.request_timeout,
            executor.place_order(&order),
        )
        .await;
        self.transition(EngineState::Polling)?;

        match result {
            Ok(ack) if ack.status.is_accepted() => {
                *available -= request.amount;
                self.gate.update_position(
                    &request.market_id,
                    request.side,
                    request.amount,
                    request.price,
                    Decimal::ZERO,
                );
                if hedge_leg {
                    if let Err(e) = self.tracker.execute_buy(
                        &request.market_id,
                        request.side,
                        request.amount,
                        request.price,
                    ) {
                        warn!(market = %request.market_id, error = %e, "hedge book not updated");
                        self.errors.record(e.kind());
                    }
                }
                info!(
                    market = %request.market_id,
                    side = %request.side,
                    amount = %request.amount.round_dp(4),
                    price = %request.price,
                    strategy = %request.strategy,
                    order_id = %ack.order_id,
                    "order filled"
                );
                Ok(Submission::Filled)
            }
            Ok(ack) => {
                let e = HedgeError::OrderRejected(format!(
                    "order {} returned {:?}",
                    ack.order_id, ack.status
                ));
                error!(market = %request.market_id, error = %e, "order not accepted by venue");
                self.errors.record(e.kind());
                Ok(Submission::Failed(e.to_string()))
            }
            Err(e) => {
                error!(market = %request.market_id, error = %e, "order submission failed");
                self.errors.record(e.kind());
                Ok(Submission::Failed(e.to_string()))
            }
        }
    }

    fn note_origin(&mut self, signal: &TradingSignal) {
        let origin = (signal.signal_type, signal.source.clone());
        let origins = self.origins.entry(signal.market_id.clone()).or_default();
        if !origins.contains(&origin) {
            origins.push(origin);
        }
    }

    /// Compare venue positions with the risk book. Mismatches are reported, not adopted.
    pub async fn reconcile(&mut self) -> Result<Vec<String>> {
        let executor = Arc::clone(&self.executor);
        let venue = call_with_timeout(
            "get_positions",
            self.config.request_timeout,
            executor.get_positions(),
        )
        .await?;

        let mut discrepancies = Vec::new();
        for position in &venue {
            let booked = self
                .gate
                .position(&position.market_id)
                .map(|p| p.contracts(position.side))
                .unwrap_or_default();
            if (booked - position.contracts).abs() > RECONCILE_TOLERANCE {
                discrepancies.push(format!(
                    "{} {}: venue holds {} contracts, book has {}",
                    position.market_id,
                    position.side,
                    position.contracts.round_dp(4),
                    booked.round_dp(4)
                ));
            }
        }

        for (market, booked) in &self.gate.state().positions {
            for side in [Side::Yes, Side::No] {
                let held = booked.contracts(side);
                let at_venue = venue
                    .iter()
                    .any(|p| &p.market_id == market && p.side == side);
                if held > RECONCILE_TOLERANCE && !at_venue {
                    discrepancies.push(format!(
                        "{} {}: book has {} contracts, venue has none",
                        market,
                        side,
                        held.round_dp(4)
                    ));
                }
            }
        }

        if discrepancies.is_empty() {
            info!(positions = venue.len(), "positions reconciled");
        }
        for discrepancy in &discrepancies {
            warn!(%discrepancy, "position mismatch");
        }
        Ok(discrepancies)
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        let metrics = self.gate.get_metrics();
        let stats = self.tracker.stats();
        StatusSnapshot {
            daily_pnl: metrics.daily_pnl,
            open_positions: metrics.open_positions,
            risk_level: metrics.risk_level,
            locked_positions: stats.locked_positions,
            total_pnl: self.realized_pnl + stats.locked_profit,
            state: self.state,
            daily_trades: metrics.daily_trades,
            total_exposure: metrics.total_exposure,
            cycles: self.cycles,
            errors: self.errors.clone(),
            warnings: metrics.warnings,
            updated_at: Utc::now(),
        }
    }

    /// Append log records and rewrite the status snapshot; failures are tallied
    async fn publish(&mut self, records: Vec<LogRecord>) {
        if let Some(log) = self.signal_log.clone() {
            if let Err(e) = log.append(&records).await {
                warn!(error = %e, "failed to append signal log");
                self.errors.record(e.kind());
            }
        }

        if let Some(writer) = self.status.clone() {
            let snapshot = self.status_snapshot();
            if let Err(e) = writer.write(&snapshot).await {
                warn!(error = %e, "failed to write status snapshot");
                self.errors.record(e.kind());
            }
        }
    }
}
