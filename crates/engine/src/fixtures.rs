//! Plans and jobs shared by the engine's unit tests.

use dustsweep_types::{
    BridgeProvider, BridgeQuote, Chain, ChainBridgePlan, ChainConsolidationPlan,
    ConsolidationJobData, DustToken, ExecutionPriority,
};
use num_bigint::BigUint;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

pub const USER: &str = "user-1";
pub const ADDRESS: &str = "0x00000000000000000000000000000000000000aa";

/// Plan sweeping $`value` of dust on `chain`, bridging unless `chain` is the destination
pub fn chain_plan(
    chain: Chain,
    destination: Chain,
    value: i64,
    priority: ExecutionPriority,
) -> ChainConsolidationPlan {
    let input = Decimal::from(value);
    let swap_output_value = input - Decimal::ONE;
    let amount = BigUint::from(value as u64 * 1_000_000 - 1_000_000);
    let bridge = (chain != destination).then(|| ChainBridgePlan {
        provider: BridgeProvider::Across,
        quote: BridgeQuote {
            provider: BridgeProvider::Across,
            quote_id: format!("across-{chain}-{destination}"),
            source_chain: chain,
            destination_chain: destination,
            input_amount: amount.clone(),
            output_amount: amount.clone(),
            fee_usd: Decimal::new(50, 2),
            estimated_time_seconds: 60,
            is_fast_fill: true,
            payload: serde_json::json!({ "route": "across" }),
        },
        input_amount: amount.clone(),
        output_amount: amount.clone(),
        fee_usd: Decimal::new(50, 2),
        estimated_time_seconds: 60,
    });
    let bridge_fee = bridge.as_ref().map(|b| b.fee_usd).unwrap_or_default();

    ChainConsolidationPlan {
        chain,
        tokens: vec![DustToken::new(
            format!("0xdust-{chain}"),
            "DUST",
            18,
            BigUint::from(10u64).pow(18),
            input,
        )],
        swap_input_value_usd: input,
        swap_output_token: format!("0xusdc-{chain}"),
        swap_output_amount: amount,
        swap_output_value_usd: swap_output_value,
        swap_fee_usd: Decimal::ZERO,
        swap_gas_estimate_usd: Decimal::ONE,
        total_fee_usd: Decimal::ONE + bridge_fee,
        expected_output_usd: swap_output_value - bridge_fee,
        bridge,
        priority,
    }
}

pub fn job(
    id: &str,
    destination: Chain,
    chain_plans: Vec<ChainConsolidationPlan>,
) -> ConsolidationJobData {
    let permit_signatures: BTreeMap<Chain, String> = chain_plans
        .iter()
        .map(|p| (p.chain, format!("0xpermit-{}", p.chain)))
        .collect();
    ConsolidationJobData {
        consolidation_id: id.to_string(),
        plan_id: format!("plan-{id}"),
        user_id: USER.to_string(),
        user_address: ADDRESS.to_string(),
        chain_plans,
        destination_chain: destination,
        destination_token: "0xusdc-destination".to_string(),
        permit_signatures,
    }
}
