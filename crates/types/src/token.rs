use num_bigint::BigUint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Chain;

/// Flat DEX fee charged on every swap into the bridgeable asset (0.3%)
pub const DEX_FEE_RATE: Decimal = Decimal::from_parts(3, 0, 0, false, 3);

/// A low-value token balance held by the user on one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DustToken {
    /// Token contract address
    pub address: String,

    pub symbol: String,

    pub decimals: u8,

    /// Raw balance in the token's base units
    #[serde(with = "crate::amount")]
    pub amount: BigUint,

    /// Current USD valuation of the balance
    pub value_usd: Decimal,
}

impl DustToken {
    pub fn new(
        address: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
        amount: BigUint,
        value_usd: Decimal,
    ) -> Self {
        Self {
            address: address.into(),
            symbol: symbol.into(),
            decimals,
            amount,
            value_usd,
        }
    }
}

/// Per-chain input to the optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationSource {
    pub chain: Chain,

    /// Sum of the USD values of `tokens`
    pub total_value_usd: Decimal,

    /// Expected USD value after swapping into the bridgeable asset
    pub estimated_output_usd: Decimal,

    pub tokens: Vec<DustToken>,
}

impl ConsolidationSource {
    /// Build a source from a token list, estimating output after the DEX fee
    pub fn from_tokens(chain: Chain, tokens: Vec<DustToken>) -> Self {
        let total_value_usd: Decimal = tokens.iter().map(|t| t.value_usd).sum();
        Self {
            chain,
            total_value_usd,
            estimated_output_usd: total_value_usd * (Decimal::ONE - DEX_FEE_RATE),
            tokens,
        }
    }
}

/// Convert a USD value into base units of a dollar-pegged asset.
///
/// Truncates toward zero; non-positive values map to zero.
pub fn usd_to_base_units(value_usd: Decimal, decimals: u32) -> BigUint {
    if value_usd <= Decimal::ZERO {
        return BigUint::default();
    }
    let mantissa = BigUint::from(value_usd.mantissa().unsigned_abs());
    let ten = BigUint::from(10u32);
    mantissa * ten.pow(decimals) / ten.pow(value_usd.scale())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn token(value: &str) -> DustToken {
        DustToken::new(
            "0xdead",
            "DUST",
            18,
            BigUint::from(1_000u32),
            Decimal::from_str(value).unwrap(),
        )
    }

    #[test]
    fn test_source_from_tokens_sums_and_applies_fee() {
        let source = ConsolidationSource::from_tokens(
            Chain::Arbitrum,
            vec![token("60"), token("40")],
        );
        assert_eq!(source.total_value_usd, Decimal::from(100));
        assert_eq!(source.estimated_output_usd, Decimal::from_str("99.7").unwrap());
    }

    #[test]
    fn test_usd_to_base_units() {
        let units = usd_to_base_units(Decimal::from_str("12.345678").unwrap(), 6);
        assert_eq!(units, BigUint::from(12_345_678u64));

        let truncated = usd_to_base_units(Decimal::from_str("1.0000009").unwrap(), 6);
        assert_eq!(truncated, BigUint::from(1_000_000u64));

        let wide = usd_to_base_units(Decimal::from(5), 18);
        assert_eq!(wide.to_string(), "5000000000000000000");

        assert_eq!(usd_to_base_units(Decimal::from(-3), 6), BigUint::default());
    }
}
