use thiserror::Error;

/// Main error type for the trading engine
#[derive(Error, Debug)]
pub enum HedgeError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout after {elapsed_ms}ms: {operation}")]
    Timeout { operation: String, elapsed_ms: u64 },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Market data errors
    #[error("Malformed market data: {0}")]
    MalformedData(String),

    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    // Order execution errors
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    // Position book errors
    #[error("Position {0} is locked and held to resolution")]
    PositionLocked(String),

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Trading halted: {0}")]
    Halted(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for HedgeError
pub type Result<T> = std::result::Result<T, HedgeError>;

/// Coarse error classes the orchestrator tallies per cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network or timeout failure; skip and retry next cycle
    TransientIo,
    /// Quote missing fields or otherwise unusable; exclude the market this cycle
    MalformedData,
    /// Venue refused or failed the order; no state update
    ExecutionFailed,
    /// Requires manual restart
    Fatal,
    /// Local bookkeeping problem (validation, io, serialization)
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransientIo => "transient_io",
            ErrorKind::MalformedData => "malformed_data",
            ErrorKind::ExecutionFailed => "execution_failed",
            ErrorKind::Fatal => "fatal",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl HedgeError {
    /// Classify this error for the per-cycle error tally
    pub fn kind(&self) -> ErrorKind {
        match self {
            HedgeError::Transport(_) | HedgeError::Timeout { .. } => ErrorKind::TransientIo,
            HedgeError::MalformedData(_) | HedgeError::UnknownMarket(_) => {
                ErrorKind::MalformedData
            }
            HedgeError::OrderRejected(_) | HedgeError::ExecutionFailed(_) => {
                ErrorKind::ExecutionFailed
            }
            HedgeError::Config(_)
            | HedgeError::InvalidStateTransition { .. }
            | HedgeError::Halted(_) => ErrorKind::Fatal,
            HedgeError::Json(_)
            | HedgeError::PositionLocked(_)
            | HedgeError::Validation(_)
            | HedgeError::Io(_)
            | HedgeError::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientIo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_transport_are_transient() {
        let timeout = HedgeError::Timeout {
            operation: "get_quote(m1)".to_string(),
            elapsed_ms: 5000,
        };
        assert!(timeout.is_transient());
        assert!(HedgeError::Transport("connection reset".into()).is_transient());
        assert!(!HedgeError::OrderRejected("no liquidity".into()).is_transient());
    }

    #[test]
    fn error_kinds_follow_taxonomy() {
        assert_eq!(
            HedgeError::MalformedData("missing no_price".into()).kind(),
            ErrorKind::MalformedData
        );
        assert_eq!(
            HedgeError::ExecutionFailed("venue down".into()).kind(),
            ErrorKind::ExecutionFailed
        );
        assert_eq!(HedgeError::Halted("critical".into()).kind(), ErrorKind::Fatal);
        assert_eq!(
            HedgeError::PositionLocked("m1".into()).kind(),
            ErrorKind::Internal
        );
    }
}
