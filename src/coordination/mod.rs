//! Coordination for long-running operation
//!
//! - Cycle-boundary stop signalling
//! - OS signal handlers

pub mod shutdown;

pub use shutdown::{install_signal_handlers, ShutdownSignal, StopHandle};
