//! In-memory venue for dry runs and tests.
//!
//! Quotes follow a bounded random walk in whole cents unless a script or a
//! fixed price is set. Orders fill immediately at the limit price against a
//! simulated cash balance, and resolving a market pays $1 per winning contract.

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::traits::{ExecutionClient, MarketDataFeed, VenueKind};
use crate::domain::{
    Balance, MarketQuote, OrderAck, OrderAction, OrderRequest, OrderStatus, Side, VenuePosition,
    WhaleTrade,
};
use crate::error::{HedgeError, Result};

const MIN_PRICE: Decimal = dec!(0.02);
const MAX_PRICE: Decimal = dec!(0.98);

#[derive(Debug, Clone)]
struct PaperMarket {
    yes_price: Decimal,
    no_price: Decimal,
    volume: Decimal,
    /// Random-walk step in cents; zero freezes the price
    drift_cents: i64,
    script: VecDeque<MarketQuote>,
    resolved: Option<Side>,
    failing_quotes: u32,
}

#[derive(Debug)]
struct PaperState {
    markets: HashMap<String, PaperMarket>,
    cash: Decimal,
    positions: HashMap<(String, Side), VenuePosition>,
    whale_trades: Vec<WhaleTrade>,
    failing_orders: u32,
    rejecting_orders: u32,
    balance_unavailable: bool,
    orders: Vec<OrderRequest>,
    rng: StdRng,
}

/// Simulated venue implementing both the data feed and the execution client
pub struct PaperExchange {
    kind: VenueKind,
    state: RwLock<PaperState>,
}

impl PaperExchange {
    pub fn new(kind: VenueKind, starting_cash: Decimal) -> Self {
        Self::with_seed(kind, starting_cash, rand::random())
    }

    /// Deterministic random walk for reproducible runs
    pub fn with_seed(kind: VenueKind, starting_cash: Decimal, seed: u64) -> Self {
        Self {
            kind,
            state: RwLock::new(PaperState {
                markets: HashMap::new(),
                cash: starting_cash,
                positions: HashMap::new(),
                whale_trades: Vec::new(),
                failing_orders: 0,
                rejecting_orders: 0,
                balance_unavailable: false,
                orders: Vec::new(),
                rng: StdRng::seed_from_u64(seed),
            }),
        }
    }

    /// List a market with a starting YES price; NO starts at the complement
    pub async fn add_market(&self, market_id: &str, yes_price: Decimal, drift_cents: i64) {
        let yes_price = yes_price.clamp(MIN_PRICE, MAX_PRICE);
        let mut state = self.state.write().await;
        state.markets.insert(
            market_id.to_string(),
            PaperMarket {
                yes_price,
                no_price: Decimal::ONE - yes_price,
                volume: dec!(1000),
                drift_cents: drift_cents.max(0),
                script: VecDeque::new(),
                resolved: None,
                failing_quotes: 0,
            },
        );
    }

    /// Pin both prices and stop the random walk
    pub async fn set_prices(
        &self,
        market_id: &str,
        yes_price: Decimal,
        no_price: Decimal,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let market = state
            .markets
            .get_mut(market_id)
            .ok_or_else(|| HedgeError::UnknownMarket(market_id.to_string()))?;
        market.yes_price = yes_price;
        market.no_price = no_price;
        market.drift_cents = 0;
        Ok(())
    }

    /// Queue quotes returned verbatim before the market resumes normal pricing
    pub async fn script_quotes(&self, market_id: &str, quotes: Vec<MarketQuote>) -> Result<()> {
        let mut state = self.state.write().await;
        let market = state
            .markets
            .get_mut(market_id)
            .ok_or_else(|| HedgeError::UnknownMarket(market_id.to_string()))?;
        market.script.extend(quotes);
        Ok(())
    }

    /// Make the next `count` quote requests for a market fail with a transport error
    pub async fn fail_quotes(&self, market_id: &str, count: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let market = state
            .markets
            .get_mut(market_id)
            .ok_or_else(|| HedgeError::UnknownMarket(market_id.to_string()))?;
        market.failing_quotes = count;
        Ok(())
    }

    /// Make the next `count` orders fail outright
    pub async fn fail_orders(&self, count: u32) {
        self.state.write().await.failing_orders = count;
    }

    /// Make the next `count` orders come back `Rejected`
    pub async fn reject_orders(&self, count: u32) {
        self.state.write().await.rejecting_orders = count;
    }

    pub async fn set_balance_unavailable(&self, unavailable: bool) {
        self.state.write().await.balance_unavailable = unavailable;
    }

    pub async fn push_whale_trade(&self, trade: WhaleTrade) {
        self.state.write().await.whale_trades.push(trade);
    }

    /// Settle a market; winning contracts pay $1 each into cash
    pub async fn resolve(&self, market_id: &str, outcome: Side) -> Result<()> {
        let mut state = self.state.write().await;
        let market = state
            .markets
            .get_mut(market_id)
            .ok_or_else(|| HedgeError::UnknownMarket(market_id.to_string()))?;
        market.resolved = Some(outcome);
        market.script.clear();

        let payout = state
            .positions
            .remove(&(market_id.to_string(), outcome))
            .map(|p| p.contracts)
            .unwrap_or_default();
        state.positions.remove(&(market_id.to_string(), outcome.opposite()));
        state.cash += payout;

        info!(market = market_id, %outcome, %payout, "paper market resolved");
        Ok(())
    }

    /// Orders accepted so far, oldest first
    pub async fn order_history(&self) -> Vec<OrderRequest> {
        self.state.read().await.orders.clone()
    }

    pub async fn cash(&self) -> Decimal {
        self.state.read().await.cash
    }
}

fn step_price(rng: &mut StdRng, price: Decimal, drift_cents: i64) -> Decimal {
    let step = rng.gen_range(-drift_cents..=drift_cents);
    (price + Decimal::new(step, 2)).clamp(MIN_PRICE, MAX_PRICE)
}

#[async_trait]
impl MarketDataFeed for PaperExchange {
    fn venue(&self) -> VenueKind {
        self.kind
    }

    async fn get_quote(&self, market_id: &str) -> Result<MarketQuote> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let market = state
            .markets
            .get_mut(market_id)
            .ok_or_else(|| HedgeError::UnknownMarket(market_id.to_string()))?;

        if market.failing_quotes > 0 {
            market.failing_quotes -= 1;
            return Err(HedgeError::Transport(format!(
                "paper venue dropped quote request for {}",
                market_id
            )));
        }

        if let Some(quote) = market.script.pop_front() {
            if let (Some(yes), Some(no)) = (quote.yes_price, quote.no_price) {
                market.yes_price = yes;
                market.no_price = no;
            }
            return Ok(quote);
        }

        if let Some(outcome) = market.resolved {
            let (yes, no) = match outcome {
                Side::Yes => (Decimal::ONE, Decimal::ZERO),
                Side::No => (Decimal::ZERO, Decimal::ONE),
            };
            return Ok(MarketQuote {
                market_id: market_id.to_string(),
                yes_price: Some(yes),
                no_price: Some(no),
                volume: market.volume,
                timestamp: Utc::now(),
                resolved: Some(outcome),
            });
        }

        if market.drift_cents > 0 {
            market.yes_price = step_price(&mut state.rng, market.yes_price, market.drift_cents);
            // NO wanders around the complement so the pair sum occasionally dips below 1
            market.no_price = step_price(
                &mut state.rng,
                Decimal::ONE - market.yes_price,
                market.drift_cents,
            );
        }

        Ok(MarketQuote {
            market_id: market_id.to_string(),
            yes_price: Some(market.yes_price),
            no_price: Some(market.no_price),
            volume: market.volume,
            timestamp: Utc::now(),
            resolved: None,
        })
    }

    async fn recent_large_trades(&self, min_amount: Decimal) -> Result<Vec<WhaleTrade>> {
        let mut state = self.state.write().await;
        let trades = std::mem::take(&mut state.whale_trades);
        Ok(trades
            .into_iter()
            .filter(|t| t.amount >= min_amount)
            .collect())
    }
}

#[async_trait]
impl ExecutionClient for PaperExchange {
    fn is_dry_run(&self) -> bool {
        true
    }

    async fn get_balance(&self) -> Result<Balance> {
        let state = self.state.read().await;
        if state.balance_unavailable {
            return Err(HedgeError::Transport(
                "paper venue balance endpoint unavailable".to_string(),
            ));
        }
        let locked: Decimal = state
            .positions
            .values()
            .map(|p| p.contracts * p.avg_price)
            .sum();
        Ok(Balance {
            available: state.cash,
            locked,
            total: state.cash + locked,
        })
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let mut state = self.state.write().await;

        if state.failing_orders > 0 {
            state.failing_orders -= 1;
            return Err(HedgeError::ExecutionFailed(format!(
                "paper venue failed order {}",
                order.client_order_id
            )));
        }

        let order_id = format!("paper-{}", Uuid::new_v4());
        let rejected = OrderAck {
            order_id: order_id.clone(),
            status: OrderStatus::Rejected,
        };

        if state.rejecting_orders > 0 {
            state.rejecting_orders -= 1;
            return Ok(rejected);
        }

        let tradable = state
            .markets
            .get(&order.market_id)
            .map(|m| m.resolved.is_none())
            .unwrap_or(false);
        if !tradable || order.price <= Decimal::ZERO || order.amount <= Decimal::ZERO {
            return Ok(rejected);
        }

        let contracts = order.contracts();
        let key = (order.market_id.clone(), order.side);

        match order.action {
            OrderAction::Buy => {
                if order.amount > state.cash {
                    debug!(
                        amount = %order.amount,
                        cash = %state.cash,
                        "paper order rejected for insufficient cash"
                    );
                    return Ok(rejected);
                }
                state.cash -= order.amount;
                let position = state.positions.entry(key).or_insert_with(|| VenuePosition {
                    market_id: order.market_id.clone(),
                    side: order.side,
                    contracts: Decimal::ZERO,
                    avg_price: Decimal::ZERO,
                });
                let cost = position.contracts * position.avg_price + order.amount;
                position.contracts += contracts;
                position.avg_price = cost / position.contracts;
            }
            OrderAction::Sell => {
                let held = state
                    .positions
                    .get(&key)
                    .map(|p| p.contracts)
                    .unwrap_or_default();
                if held.is_zero() {
                    return Ok(rejected);
                }
                let sold = contracts.min(held);
                state.cash += sold * order.price;
                if sold >= held {
                    state.positions.remove(&key);
                } else if let Some(position) = state.positions.get_mut(&key) {
                    position.contracts -= sold;
                }
            }
        }

        state.orders.push(order.clone());
        debug!(
            order_id = %order_id,
            market = %order.market_id,
            side = %order.side,
            action = %order.action,
            amount = %order.amount,
            price = %order.price,
            "paper order filled"
        );

        Ok(OrderAck {
            order_id,
            status: OrderStatus::Filled,
        })
    }

    async fn get_positions(&self) -> Result<Vec<VenuePosition>> {
        let state = self.state.read().await;
        let mut positions: Vec<VenuePosition> = state.positions.values().cloned().collect();
        positions.sort_by(|a, b| {
            a.market_id
                .cmp(&b.market_id)
                .then_with(|| a.side.as_str().cmp(b.side.as_str()))
        });
        Ok(positions)
    }
}
