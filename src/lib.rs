//! Multi-chain dust consolidation.
//!
//! Small token balances spread over several EVM chains are swapped into a
//! bridgeable stablecoin on each chain and bridged to one destination chain.
//! The work is split across the member crates re-exported here:
//!
//! - [`optimizer`]: which chains are worth sweeping, over which bridge, in which order
//! - [`engine`]: quoting service, execution engine, retries and bridge tracking
//! - [`status`]: per-consolidation status records and the TTL cache
//! - [`queue`]: job queue and rate-limited worker pool
//! - [`config`]: file and environment configuration
//! - [`metrics`]: Prometheus metrics and tracing setup

pub use dustsweep_config as config;
pub use dustsweep_engine as engine;
pub use dustsweep_metrics as metrics;
pub use dustsweep_optimizer as optimizer;
pub use dustsweep_queue as queue;
pub use dustsweep_ratelimit as ratelimit;
pub use dustsweep_status as status;
pub use dustsweep_types as types;

pub use dustsweep_engine::{
    ConsolidationExecutionEngine, ConsolidationService, DustSweep, DustSweepBuilder,
    RetryController,
};
pub use dustsweep_optimizer::ConsolidationOptimizer;
