use num_bigint::BigUint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Chain;

/// Bridge providers the quote source can route through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeProvider {
    Across,
    Stargate,
    Hop,
    Cbridge,
    Socket,
    Synapse,
}

impl BridgeProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeProvider::Across => "across",
            BridgeProvider::Stargate => "stargate",
            BridgeProvider::Hop => "hop",
            BridgeProvider::Cbridge => "cbridge",
            BridgeProvider::Socket => "socket",
            BridgeProvider::Synapse => "synapse",
        }
    }
}

impl fmt::Display for BridgeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user wants the optimizer to favour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityMode {
    #[default]
    Cost,
    Speed,
    Reliability,
}

/// Relative weights applied to the speed, cost and reliability components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityWeights {
    pub speed: f64,
    pub cost: f64,
    pub reliability: f64,
}

impl PriorityMode {
    pub fn weights(&self) -> PriorityWeights {
        match self {
            PriorityMode::Speed => PriorityWeights {
                speed: 0.6,
                cost: 0.2,
                reliability: 0.2,
            },
            PriorityMode::Cost => PriorityWeights {
                speed: 0.2,
                cost: 0.6,
                reliability: 0.2,
            },
            PriorityMode::Reliability => PriorityWeights {
                speed: 0.2,
                cost: 0.2,
                reliability: 0.6,
            },
        }
    }
}

impl fmt::Display for PriorityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriorityMode::Cost => "cost",
            PriorityMode::Speed => "speed",
            PriorityMode::Reliability => "reliability",
        };
        f.write_str(name)
    }
}

/// Request for bridge routes from one chain to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub source_chain: Chain,
    pub destination_chain: Chain,
    pub source_token: String,
    pub destination_token: String,

    /// Amount of `source_token` in base units
    #[serde(with = "crate::amount")]
    pub amount: BigUint,

    pub user_address: String,

    /// Maximum accepted slippage as a fraction (0.005 = 0.5%)
    pub slippage: Decimal,
}

/// A single route offered by a bridge provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeQuote {
    pub provider: BridgeProvider,
    pub quote_id: String,
    pub source_chain: Chain,
    pub destination_chain: Chain,

    #[serde(with = "crate::amount")]
    pub input_amount: BigUint,

    #[serde(with = "crate::amount")]
    pub output_amount: BigUint,

    pub fee_usd: Decimal,

    pub estimated_time_seconds: u64,

    /// Provider fronts liquidity on the destination before source finality
    pub is_fast_fill: bool,

    /// Provider-specific route data, passed back untouched when building the transaction
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A scored bridge quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeComparison {
    pub provider: BridgeProvider,
    pub quote: BridgeQuote,

    #[serde(with = "crate::amount")]
    pub output_amount: BigUint,

    pub fee_usd: Decimal,
    pub estimated_time_seconds: u64,

    /// Composite score, higher is better
    pub score: f64,
}

/// Unsigned transaction produced by the quote source for a selected route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub chain: Chain,
    pub to: String,

    /// Hex-encoded calldata
    pub data: String,

    #[serde(with = "crate::amount")]
    pub value: BigUint,

    pub gas_limit: Option<u64>,
}

/// Settlement state of a submitted bridge transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BridgeStatus {
    Pending,
    Completed {
        destination_tx_hash: String,
        #[serde(with = "crate::amount::option", default)]
        output_amount: Option<BigUint>,
    },
    Failed {
        reason: String,
    },
    Refunded {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        for mode in [PriorityMode::Cost, PriorityMode::Speed, PriorityMode::Reliability] {
            let w = mode.weights();
            assert!((w.speed + w.cost + w.reliability - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_dominant_weight_matches_mode() {
        assert_eq!(PriorityMode::Speed.weights().speed, 0.6);
        assert_eq!(PriorityMode::Cost.weights().cost, 0.6);
        assert_eq!(PriorityMode::Reliability.weights().reliability, 0.6);
    }

    #[test]
    fn test_bridge_status_tagged() {
        let status = BridgeStatus::Failed {
            reason: "relayer down".into(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "relayer down");
    }
}
