use dustsweep_types::{BridgeComparison, BridgeQuote, PriorityMode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::tables::provider_base_scores;

/// Fee (USD) and duration (minutes) below which a quote earns bonus points
pub const SCORE_PIVOT: f64 = 20.0;

const PIVOT_MULTIPLIER: f64 = 2.0;
const FAST_FILL_BONUS: f64 = 10.0;
const SPEED_TIME_CEILING_MINUTES: f64 = 100.0;
const MODE_ADJUSTMENT_FACTOR: f64 = 0.5;
const VALUE_LOG_FACTOR: f64 = 5.0;

/// Composite score for a bridge quote under a priority mode; higher is better
pub fn calculate_bridge_score(quote: &BridgeQuote, mode: PriorityMode) -> f64 {
    let base = provider_base_scores(quote.provider);
    let weights = mode.weights();

    let mut score = base.speed * weights.speed
        + base.cost * weights.cost
        + base.reliability * weights.reliability;

    let fee_usd = quote.fee_usd.to_f64().unwrap_or(f64::MAX);
    score += (SCORE_PIVOT - fee_usd).max(0.0) * PIVOT_MULTIPLIER * weights.cost;

    let minutes = quote.estimated_time_seconds as f64 / 60.0;
    score += (SCORE_PIVOT - minutes).max(0.0) * PIVOT_MULTIPLIER * weights.speed;

    if quote.is_fast_fill {
        score += FAST_FILL_BONUS * weights.speed;
    }

    score
}

/// Score every quote and order them best first.
///
/// The sort is stable so equal scores keep the quote source's order.
pub fn rank_quotes(quotes: Vec<BridgeQuote>, mode: PriorityMode) -> Vec<BridgeComparison> {
    let mut ranked: Vec<BridgeComparison> = quotes
        .into_iter()
        .map(|quote| BridgeComparison {
            provider: quote.provider,
            output_amount: quote.output_amount.clone(),
            fee_usd: quote.fee_usd,
            estimated_time_seconds: quote.estimated_time_seconds,
            score: calculate_bridge_score(&quote, mode),
            quote,
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Execution priority for a cross-chain source; lower runs earlier.
///
/// Cheap chains (low gas relative to value) and large balances go first.
pub fn calculate_chain_priority(
    gas_estimate_usd: Decimal,
    value_usd: Decimal,
    mode: PriorityMode,
    best: Option<&BridgeComparison>,
) -> f64 {
    let value = value_usd.to_f64().unwrap_or(0.0);
    if value <= 0.0 {
        return f64::INFINITY;
    }
    let gas = gas_estimate_usd.to_f64().unwrap_or(0.0);

    let mut priority = gas / value * 100.0;

    if let Some(best) = best {
        match mode {
            PriorityMode::Speed => {
                let minutes = best.estimated_time_seconds as f64 / 60.0;
                priority -= (SPEED_TIME_CEILING_MINUTES - minutes) * MODE_ADJUSTMENT_FACTOR;
            }
            PriorityMode::Reliability => {
                let reliability = provider_base_scores(best.provider).reliability;
                priority -= reliability * MODE_ADJUSTMENT_FACTOR;
            }
            PriorityMode::Cost => {}
        }
    }

    priority - value.log10() * VALUE_LOG_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;
    use dustsweep_types::{BridgeProvider, Chain};
    use num_bigint::BigUint;

    fn quote(provider: BridgeProvider, fee_cents: i64, seconds: u64, fast: bool) -> BridgeQuote {
        BridgeQuote {
            provider,
            quote_id: format!("{provider}-{fee_cents}"),
            source_chain: Chain::Arbitrum,
            destination_chain: Chain::Base,
            input_amount: BigUint::from(10_000_000u32),
            output_amount: BigUint::from(9_900_000u32),
            fee_usd: Decimal::new(fee_cents, 2),
            estimated_time_seconds: seconds,
            is_fast_fill: fast,
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_bridge_score_formula() {
        // across base (95, 80, 95) under cost weights (0.2, 0.6, 0.2)
        // = 19 + 48 + 19 = 86
        // fee $1: (20 - 1) * 2 * 0.6 = 22.8
        // 2 minutes: (20 - 2) * 2 * 0.2 = 7.2
        // fast fill: 10 * 0.2 = 2
        let score = calculate_bridge_score(
            &quote(BridgeProvider::Across, 100, 120, true),
            PriorityMode::Cost,
        );
        assert!((score - 118.0).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_fee_and_time_bonuses_floor_at_zero() {
        let slow_and_expensive = quote(BridgeProvider::Hop, 5_000, 3_600, false);
        let score = calculate_bridge_score(&slow_and_expensive, PriorityMode::Speed);
        // hop base (75, 75, 85) under speed weights (0.6, 0.2, 0.2)
        assert!((score - (45.0 + 15.0 + 17.0)).abs() < 1e-9);
    }

    #[test]
    fn test_lower_fee_scores_higher_under_cost() {
        let score = |fee_cents| {
            calculate_bridge_score(
                &quote(BridgeProvider::Stargate, fee_cents, 600, false),
                PriorityMode::Cost,
            )
        };

        // $4 vs $5: one dollar below the pivot is worth 2 * 0.6 points
        assert!(score(400) > score(500));
        assert!((score(400) - score(500) - 1.2).abs() < 1e-9);

        let below_pivot: Vec<f64> = (0..2_000).rev().step_by(50).map(score).collect();
        assert!(below_pivot.windows(2).all(|w| w[1] > w[0]));

        // past the pivot the fee bonus is already zero
        assert_eq!(score(2_000), score(2_500));
        assert_eq!(score(2_500), score(5_000));
    }

    #[test]
    fn test_rank_quotes_best_first() {
        let ranked = rank_quotes(
            vec![
                quote(BridgeProvider::Synapse, 800, 900, false),
                quote(BridgeProvider::Across, 100, 60, true),
                quote(BridgeProvider::Hop, 300, 600, false),
            ],
            PriorityMode::Cost,
        );
        let providers: Vec<_> = ranked.iter().map(|c| c.provider).collect();
        assert_eq!(providers[0], BridgeProvider::Across);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_chain_priority_cost_mode() {
        // gas $0.10 on $50: 0.2, minus log10(50) * 5 = 8.4949
        let priority = calculate_chain_priority(
            Decimal::new(10, 2),
            Decimal::from(50),
            PriorityMode::Cost,
            None,
        );
        assert!((priority - (0.2 - 50f64.log10() * 5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_chain_priority_mode_adjustments() {
        let ranked = rank_quotes(
            vec![quote(BridgeProvider::Across, 100, 120, true)],
            PriorityMode::Speed,
        );
        let best = ranked.first();
        let gas = Decimal::new(10, 2);
        let value = Decimal::from(50);

        let cost = calculate_chain_priority(gas, value, PriorityMode::Cost, best);
        let speed = calculate_chain_priority(gas, value, PriorityMode::Speed, best);
        let reliability = calculate_chain_priority(gas, value, PriorityMode::Reliability, best);

        assert!((cost - speed - (100.0 - 2.0) * 0.5).abs() < 1e-9);
        assert!((cost - reliability - 95.0 * 0.5).abs() < 1e-9);
    }
}
