pub mod error;
pub mod mock;
pub mod optimizer;
pub mod scoring;
pub mod tables;
pub mod traits;

pub use error::*;
pub use mock::MockQuoteSource;
pub use optimizer::*;
pub use scoring::{calculate_bridge_score, calculate_chain_priority, rank_quotes, SCORE_PIVOT};
pub use tables::{BridgeAsset, ChainEconomics, ChainTable, ProviderScores};
pub use traits::*;
