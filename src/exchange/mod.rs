mod paper;
mod traits;

pub use paper::PaperExchange;
pub use traits::{call_with_timeout, ExecutionClient, MarketDataFeed, VenueKind};

#[cfg(test)]
pub use traits::{MockExecutionClient, MockMarketDataFeed};
