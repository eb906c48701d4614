pub mod signal_log;
pub mod status;

pub use signal_log::{LogRecord, OutcomeRecord, SignalLog, SignalRecord};
pub use status::{ErrorTally, StatusSnapshot, StatusWriter};
