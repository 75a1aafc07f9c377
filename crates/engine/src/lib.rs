//! Consolidation execution.
//!
//! [`ConsolidationService`] turns quote requests into stored plans and
//! enqueues accepted plans. [`ConsolidationExecutionEngine`] processes
//! queued jobs chain by chain, [`BridgeTracker`] follows bridge transfers
//! until they settle, and [`RetryController`] re-runs a single failed
//! chain. [`DustSweep`] wires them together over in-memory backends.

pub mod builder;
pub mod engine;
pub mod error;
pub mod executor;
pub mod mock;
pub mod retry;
pub mod service;
pub mod tracker;

#[cfg(test)]
mod fixtures;

pub use builder::*;
pub use engine::*;
pub use error::*;
pub use executor::*;
pub use mock::*;
pub use retry::*;
pub use service::*;
pub use tracker::*;
