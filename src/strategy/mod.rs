//! Strategy module
//!
//! - `hedge_tracker` - per-market YES/NO hedge book and profit-lock detection
//! - `risk` - pre-trade risk gate and daily loss circuit breaker
//! - `signal` - strategy variants producing normalized trading signals
//! - `orchestrator` - the poll / gate / execute loop tying them together

pub mod hedge_tracker;
pub mod orchestrator;
pub mod risk;
pub mod signal;

pub use hedge_tracker::{
    ArbPosition, ArbitragePositionTracker, BuyDecision, BuyReason, ClosedPosition, TrackerConfig,
    TrackerStats,
};
pub use orchestrator::{CycleReport, ExecutionOrchestrator, OrchestratorConfig, HEDGE_SOURCE};
pub use risk::{
    DailySummary, ExitReason, RiskDecision, RiskGate, RiskLevel, RiskLimits, RiskMetrics,
    RiskPosition, RiskState,
};
pub use signal::{
    ArbitrageStrategy, MomentumStrategy, PriceHistory, SentimentStrategy, SignalGenerator,
    SignalInput, Strategy, WhaleFollowStrategy,
};
