pub mod amount;
pub mod bridge;
pub mod chain;
pub mod optimization;
pub mod plan;
pub mod result;
pub mod status;
pub mod token;
pub mod tracking;

pub use bridge::*;
pub use chain::*;
pub use optimization::*;
pub use plan::*;
pub use result::*;
pub use status::*;
pub use token::*;
pub use tracking::*;

/// Current wall-clock time as Unix milliseconds
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
