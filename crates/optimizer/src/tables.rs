use dustsweep_types::{BridgeProvider, Chain};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dollar-pegged asset dust is swapped into before bridging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeAsset {
    pub address: String,
    pub decimals: u32,
}

impl BridgeAsset {
    pub fn new(address: impl Into<String>, decimals: u32) -> Self {
        Self {
            address: address.into(),
            decimals,
        }
    }
}

/// Static per-provider scores on a 0-100 scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderScores {
    pub speed: f64,
    pub cost: f64,
    pub reliability: f64,
}

pub fn provider_base_scores(provider: BridgeProvider) -> ProviderScores {
    let (speed, cost, reliability) = match provider {
        BridgeProvider::Across => (95.0, 80.0, 95.0),
        BridgeProvider::Stargate => (70.0, 85.0, 90.0),
        BridgeProvider::Hop => (75.0, 75.0, 85.0),
        BridgeProvider::Cbridge => (70.0, 80.0, 80.0),
        BridgeProvider::Socket => (80.0, 75.0, 75.0),
        BridgeProvider::Synapse => (70.0, 75.0, 80.0),
    };
    ProviderScores {
        speed,
        cost,
        reliability,
    }
}

/// Typical cost of a swap transaction on each chain, in USD
pub fn default_gas_estimate_usd(chain: Chain) -> Decimal {
    // cents
    let cents: i64 = match chain {
        Chain::Ethereum => 500,
        Chain::Arbitrum => 10,
        Chain::Optimism => 10,
        Chain::Base => 5,
        Chain::Polygon => 2,
        Chain::Bsc => 10,
        Chain::Linea => 15,
        Chain::Avalanche => 15,
    };
    Decimal::new(cents, 2)
}

/// Canonical USDC deployments used when no native stablecoin is configured
pub fn fallback_bridge_asset(chain: Chain) -> BridgeAsset {
    match chain {
        Chain::Ethereum => BridgeAsset::new("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6),
        Chain::Arbitrum => BridgeAsset::new("0xaf88d065e77c8cC2239327C5EDb3A432268e5831", 6),
        Chain::Optimism => BridgeAsset::new("0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85", 6),
        Chain::Base => BridgeAsset::new("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", 6),
        Chain::Polygon => BridgeAsset::new("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", 6),
        Chain::Bsc => BridgeAsset::new("0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d", 18),
        Chain::Linea => BridgeAsset::new("0x176211869cA2b568f2A7D4EE941E073a821EE1ff", 6),
        Chain::Avalanche => BridgeAsset::new("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E", 6),
    }
}

/// Configured override for one chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainEconomics {
    pub gas_estimate_usd: Option<Decimal>,
    pub native_stablecoin: Option<BridgeAsset>,
}

/// Per-chain gas estimates and bridgeable assets, with configured overrides
#[derive(Debug, Clone, Default)]
pub struct ChainTable {
    overrides: HashMap<Chain, ChainEconomics>,
}

impl ChainTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, chain: Chain, economics: ChainEconomics) -> Self {
        self.overrides.insert(chain, economics);
        self
    }

    pub fn gas_estimate_usd(&self, chain: Chain) -> Decimal {
        self.overrides
            .get(&chain)
            .and_then(|o| o.gas_estimate_usd)
            .unwrap_or_else(|| default_gas_estimate_usd(chain))
    }

    pub fn bridge_asset(&self, chain: Chain) -> BridgeAsset {
        self.overrides
            .get(&chain)
            .and_then(|o| o.native_stablecoin.clone())
            .unwrap_or_else(|| fallback_bridge_asset(chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_take_precedence() {
        let table = ChainTable::new().with_override(
            Chain::Polygon,
            ChainEconomics {
                gas_estimate_usd: Some(Decimal::new(7, 2)),
                native_stablecoin: Some(BridgeAsset::new("0xnative", 6)),
            },
        );
        assert_eq!(table.gas_estimate_usd(Chain::Polygon), Decimal::new(7, 2));
        assert_eq!(table.bridge_asset(Chain::Polygon).address, "0xnative");
        assert_eq!(table.gas_estimate_usd(Chain::Ethereum), Decimal::from(5));
    }

    #[test]
    fn test_bsc_usdc_has_18_decimals() {
        assert_eq!(fallback_bridge_asset(Chain::Bsc).decimals, 18);
        assert_eq!(fallback_bridge_asset(Chain::Base).decimals, 6);
    }
}
