use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Side, SignalType};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderAction::Buy => write!(f, "BUY"),
            OrderAction::Sell => write!(f, "SELL"),
        }
    }
}

/// Order status reported by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Accepted and resting on the book
    Pending,
    /// Fully filled
    Filled,
    /// Cancelled before fill
    Cancelled,
    /// Refused by the venue
    Rejected,
}

impl OrderStatus {
    /// Accepted by the venue; position state is updated for these
    pub fn is_accepted(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Pending)
    }
}

/// Order submitted to an execution client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub market_id: String,
    pub side: Side,
    pub action: OrderAction,
    /// Dollars to spend (buy) or receive (sell)
    pub amount: Decimal,
    /// Limit price per contract
    pub price: Decimal,
}

impl OrderRequest {
    pub fn buy(market_id: impl Into<String>, side: Side, amount: Decimal, price: Decimal) -> Self {
        Self {
            client_order_id: Uuid::new_v4().to_string(),
            market_id: market_id.into(),
            side,
            action: OrderAction::Buy,
            amount,
            price,
        }
    }

    pub fn sell(market_id: impl Into<String>, side: Side, amount: Decimal, price: Decimal) -> Self {
        Self {
            action: OrderAction::Sell,
            ..Self::buy(market_id, side, amount, price)
        }
    }

    /// Contracts implied by the dollar amount at the limit price
    pub fn contracts(&self) -> Decimal {
        if self.price.is_zero() {
            Decimal::ZERO
        } else {
            self.amount / self.price
        }
    }
}

/// Venue acknowledgement of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub status: OrderStatus,
}

/// Account balance at the execution venue
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub available: Decimal,
    pub locked: Decimal,
    pub total: Decimal,
}

/// Position as reported by the execution venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenuePosition {
    pub market_id: String,
    pub side: Side,
    pub contracts: Decimal,
    pub avg_price: Decimal,
}

/// Trade candidate built from a signal, evaluated by the risk gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub market_id: String,
    pub side: Side,
    /// Dollars
    pub amount: Decimal,
    pub price: Decimal,
    pub strategy: SignalType,
    pub signal_confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl TradeRequest {
    pub fn new(
        market_id: impl Into<String>,
        side: Side,
        amount: Decimal,
        price: Decimal,
        strategy: SignalType,
        signal_confidence: f64,
    ) -> Self {
        Self {
            market_id: market_id.into(),
            side,
            amount,
            price,
            strategy,
            signal_confidence,
            created_at: Utc::now(),
        }
    }

    pub fn to_order(&self) -> OrderRequest {
        OrderRequest::buy(self.market_id.clone(), self.side, self.amount, self.price)
    }
}
