pub mod market;
pub mod order;
pub mod signal;
pub mod state;

pub use market::*;
pub use order::*;
pub use signal::*;
pub use state::*;
