use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BridgeProvider, Chain};

/// Payload of a bridge settlement tracking job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTrackJob {
    pub consolidation_id: String,
    pub chain: Chain,
    pub provider: BridgeProvider,
    pub source_tx_hash: String,
    pub destination_chain: Chain,

    /// Planned USD value delivered on the destination
    #[serde(default)]
    pub expected_output_usd: Option<Decimal>,

    /// Number of status checks already made
    #[serde(default)]
    pub attempt: u32,
}

impl BridgeTrackJob {
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}
