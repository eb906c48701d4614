pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod services;
pub mod strategy;

pub use config::AppConfig;
pub use coordination::{ShutdownSignal, StopHandle};
pub use error::{ErrorKind, HedgeError, Result};
pub use exchange::{ExecutionClient, MarketDataFeed, PaperExchange, VenueKind};
pub use services::{SignalLog, StatusSnapshot, StatusWriter};
pub use strategy::{
    ArbitragePositionTracker, ExecutionOrchestrator, RiskGate, RiskLevel, SignalGenerator,
};
