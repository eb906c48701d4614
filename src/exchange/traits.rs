use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::domain::{Balance, MarketQuote, OrderAck, OrderRequest, VenuePosition, WhaleTrade};
use crate::error::{HedgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
    /// In-memory dry-run venue
    Paper,
    /// Venue orders are sent to
    Execution,
    /// Venue used only for leading price moves
    Reference,
}

impl VenueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Execution => "execution",
            Self::Reference => "reference",
        }
    }
}

impl std::fmt::Display for VenueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source of quotes and large-trade prints
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    fn venue(&self) -> VenueKind;

    async fn get_quote(&self, market_id: &str) -> Result<MarketQuote>;

    /// Trades at or above `min_amount` since the previous call
    async fn recent_large_trades(&self, _min_amount: Decimal) -> Result<Vec<WhaleTrade>> {
        Ok(Vec::new())
    }
}

/// Order entry and account state at the execution venue
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    fn is_dry_run(&self) -> bool;

    async fn get_balance(&self) -> Result<Balance>;

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck>;

    async fn get_positions(&self) -> Result<Vec<VenuePosition>>;
}

/// Run a venue call with a per-call deadline; expiry becomes a transient `Timeout`
pub async fn call_with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(HedgeError::Timeout {
            operation: operation.to_string(),
            elapsed_ms: limit.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn call_with_timeout_fails_closed() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, HedgeError>(1)
        };
        let err = call_with_timeout("get_quote(m1)", Duration::from_millis(10), slow)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("get_quote(m1)"));

        let fast = async { Ok::<_, HedgeError>(7) };
        let value = call_with_timeout("get_balance", Duration::from_millis(100), fast)
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
