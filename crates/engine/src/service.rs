use dustsweep_metrics::MetricsCollector;
use dustsweep_optimizer::ConsolidationOptimizer;
use dustsweep_queue::{JobHandle, JobOptions, JobPriority, JobQueue};
use dustsweep_status::{keys, Cache, CacheExt, StatusTracker};
use dustsweep_types::{
    now_millis, Chain, ChainConsolidationPlan, ConsolidationEvent, ConsolidationExecuteRequest,
    ConsolidationExecuteResult, ConsolidationJobData, ConsolidationPlan,
    ConsolidationQuoteRequest, ConsolidationSource, ConsolidationStatusDetail, PriorityMode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ServiceError;

/// Added to the slowest bridge when estimating total time
const TIME_BUFFER_SECONDS: u64 = 300;

const MAX_SLIPPAGE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub max_chains_per_consolidation: usize,
    /// How long a quoted plan can be executed
    pub plan_ttl: Duration,
    /// Retention of job payloads, and of plans once executed
    pub job_ttl: Duration,
    pub default_priority: PriorityMode,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_chains_per_consolidation: 10,
            plan_ttl: Duration::from_secs(30 * 60),
            job_ttl: Duration::from_secs(60 * 60),
            default_priority: PriorityMode::Cost,
        }
    }
}

/// A stored plan and the caveats found while building it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationQuote {
    pub plan: ConsolidationPlan,
    pub warnings: Vec<String>,
}

/// An accepted execution request
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionTicket {
    pub consolidation_id: String,
    pub status: ConsolidationStatusDetail,
    pub job: JobHandle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSimulation {
    pub chain: Chain,
    pub can_swap: bool,
    pub can_bridge: bool,
    pub estimated_output_usd: Decimal,
    pub errors: Vec<String>,
}

/// Dry run of a quote request; nothing is stored or enqueued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationSimulation {
    pub chains: Vec<ChainSimulation>,
    pub total_expected_output_usd: Decimal,
    pub all_routes_available: bool,
}

/// Entry point for quoting, executing and inspecting consolidations
pub struct ConsolidationService {
    optimizer: Arc<ConsolidationOptimizer>,
    tracker: Arc<dyn StatusTracker>,
    cache: Arc<dyn Cache>,
    queue: Arc<dyn JobQueue<ConsolidationJobData>>,
    metrics: Option<Arc<MetricsCollector>>,
    config: ServiceConfig,
}

impl ConsolidationService {
    pub fn new(
        optimizer: Arc<ConsolidationOptimizer>,
        tracker: Arc<dyn StatusTracker>,
        cache: Arc<dyn Cache>,
        queue: Arc<dyn JobQueue<ConsolidationJobData>>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            optimizer,
            tracker,
            cache,
            queue,
            metrics: None,
            config,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUOTING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Optimize the request into a plan and store it until it expires
    pub async fn get_quote(
        &self,
        request: &ConsolidationQuoteRequest,
    ) -> Result<ConsolidationQuote, ServiceError> {
        let started = Instant::now();
        let result = self.build_plan(request).await;

        if let Some(metrics) = &self.metrics {
            let failure = result.as_ref().err().map(failure_label);
            metrics.record_quote(started.elapsed(), failure);
        }

        let quote = result?;
        self.cache
            .set(&keys::plan(&quote.plan.id), &quote.plan, self.config.plan_ttl)
            .await?;

        info!(
            plan_id = %quote.plan.id,
            user_id = %quote.plan.user_id,
            chains = quote.plan.chain_plans.len(),
            input_usd = %quote.plan.total_input_value_usd.round_dp(2),
            output_usd = %quote.plan.expected_output_usd.round_dp(2),
            fee_percentage = %quote.plan.fee_percentage.round_dp(1),
            "Quote generated"
        );

        Ok(quote)
    }

    /// Preview which chains could be swept without storing a plan
    pub async fn simulate(
        &self,
        request: &ConsolidationQuoteRequest,
    ) -> Result<ConsolidationSimulation, ServiceError> {
        let quote = self.build_plan(request).await?;
        let plan = &quote.plan;

        let mut chains: Vec<ChainSimulation> = plan
            .chain_plans
            .iter()
            .map(|cp| ChainSimulation {
                chain: cp.chain,
                can_swap: true,
                can_bridge: cp.bridge.is_some() || cp.chain == plan.destination_chain,
                estimated_output_usd: cp.expected_output_usd,
                errors: Vec::new(),
            })
            .collect();

        chains.extend(plan.optimization.skipped().map(|skipped| ChainSimulation {
            chain: skipped.chain,
            can_swap: true,
            can_bridge: false,
            estimated_output_usd: Decimal::ZERO,
            errors: skipped.skip_reason.iter().cloned().collect(),
        }));

        Ok(ConsolidationSimulation {
            all_routes_available: chains.iter().all(|c| c.can_swap && c.can_bridge),
            total_expected_output_usd: plan.expected_output_usd,
            chains,
        })
    }

    async fn build_plan(
        &self,
        request: &ConsolidationQuoteRequest,
    ) -> Result<ConsolidationQuote, ServiceError> {
        self.validate(request)?;

        let mut warnings = Vec::new();
        let min = self.optimizer.config().min_sweep_value_usd;

        let (viable, below): (Vec<ConsolidationSource>, Vec<ConsolidationSource>) = request
            .sources
            .iter()
            .map(|s| ConsolidationSource::from_tokens(s.chain, s.tokens.clone()))
            .partition(|s| s.total_value_usd >= min);

        if viable.is_empty() {
            return Err(ServiceError::InsufficientValue {
                min_value_usd: min.to_string(),
            });
        }
        if !below.is_empty() {
            let names: Vec<&str> = below.iter().map(|s| s.chain.as_str()).collect();
            warnings.push(format!(
                "Skipped {} chains with value below ${}: {}",
                below.len(),
                min,
                names.join(", ")
            ));
        }

        let priority = request.priority.unwrap_or(self.config.default_priority);
        let custom = self.slippage_override(request.slippage);
        let optimizer = custom.as_ref().unwrap_or(self.optimizer.as_ref());

        let optimization = optimizer
            .optimize(
                &viable,
                request.destination_chain,
                &request.destination_token,
                &request.user_address,
                priority,
            )
            .await;

        for skipped in optimization.skipped() {
            if let Some(metrics) = &self.metrics {
                metrics.record_chain_skipped(skipped.chain);
            }
            if let Some(reason) = &skipped.skip_reason {
                warn!(chain = %skipped.chain, reason = %reason, "Chain excluded from plan");
                warnings.push(format!("Excluded {}: {}", skipped.chain, reason));
            }
        }

        let chain_plans =
            optimizer.build_chain_plans(&optimization, &viable, request.destination_chain);
        if chain_plans.is_empty() {
            return Err(ServiceError::NoViableRoutes);
        }

        let totals = PlanTotals::of(&viable, &chain_plans);
        let profitability = optimizer.is_profitable(
            totals.input_usd,
            totals.expected_output_usd,
            totals.fees_usd(),
        );
        if !profitability.profitable {
            warnings.push(format!(
                "Low profitability: only {}% of input value expected as output",
                (profitability.ratio * Decimal::ONE_HUNDRED).round_dp(1)
            ));
        }

        let created_at = now_millis();
        let plan = ConsolidationPlan {
            id: format!("plan-{}", Uuid::new_v4()),
            user_id: request.user_id.clone(),
            user_address: request.user_address.clone(),
            sources: viable,
            optimization,
            destination_chain: request.destination_chain,
            destination_token: request.destination_token.clone(),
            total_input_value_usd: totals.input_usd,
            total_swap_fees_usd: totals.swap_fees_usd,
            total_bridge_fees_usd: totals.bridge_fees_usd,
            total_gas_usd: totals.gas_usd,
            total_fees_usd: totals.fees_usd(),
            expected_output_usd: totals.expected_output_usd,
            fee_percentage: totals.fee_percentage(),
            estimated_total_time_seconds: totals.max_bridge_seconds + TIME_BUFFER_SECONDS,
            strategy: priority,
            created_at,
            expires_at: created_at + self.config.plan_ttl.as_millis() as u64,
            chain_plans,
        };

        Ok(ConsolidationQuote { plan, warnings })
    }

    fn validate(&self, request: &ConsolidationQuoteRequest) -> Result<(), ServiceError> {
        let invalid = |reason: String| Err(ServiceError::InvalidRequest { reason });

        if request.sources.is_empty() {
            return invalid("No source chains provided".into());
        }
        let max = self.config.max_chains_per_consolidation;
        if request.sources.len() > max {
            return invalid(format!(
                "Too many source chains: {} > {}",
                request.sources.len(),
                max
            ));
        }
        if request.destination_token.trim().is_empty() {
            return invalid("Destination token is required".into());
        }
        if request.user_address.trim().is_empty() {
            return invalid("User address is required".into());
        }
        if let Some(source) = request.sources.iter().find(|s| s.tokens.is_empty()) {
            return invalid(format!("No tokens provided for chain {}", source.chain));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(source) = request.sources.iter().find(|s| !seen.insert(s.chain)) {
            return invalid(format!("Chain {} listed more than once", source.chain));
        }
        if let Some(slippage) = request.slippage {
            if slippage <= Decimal::ZERO || slippage > MAX_SLIPPAGE {
                return invalid(format!("Slippage {slippage} must be in (0, {MAX_SLIPPAGE}]"));
            }
        }
        Ok(())
    }

    /// Optimizer for a request overriding the configured slippage
    fn slippage_override(&self, slippage: Option<Decimal>) -> Option<ConsolidationOptimizer> {
        let slippage = slippage.filter(|s| *s != self.optimizer.config().slippage)?;
        let mut config = self.optimizer.config().clone();
        config.slippage = slippage;
        Some(ConsolidationOptimizer::new(
            self.optimizer.quote_source().clone(),
            config,
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Turn a stored plan into a queued consolidation job
    pub async fn execute(
        &self,
        request: &ConsolidationExecuteRequest,
    ) -> Result<ExecutionTicket, ServiceError> {
        let plan: ConsolidationPlan = self
            .cache
            .get(&keys::plan(&request.plan_id))
            .await?
            .ok_or_else(|| ServiceError::PlanNotFound(request.plan_id.clone()))?;

        if plan.is_expired(now_millis()) {
            return Err(ServiceError::PlanExpired(plan.id));
        }
        if plan.user_id != request.user_id {
            return Err(ServiceError::UserMismatch { plan_id: plan.id });
        }

        let consolidation_id = format!("cons-{}", Uuid::new_v4());
        let job = ConsolidationJobData {
            consolidation_id: consolidation_id.clone(),
            plan_id: plan.id.clone(),
            user_id: request.user_id.clone(),
            user_address: request.user_address.clone(),
            chain_plans: plan.chain_plans.clone(),
            destination_chain: plan.destination_chain,
            destination_token: plan.destination_token.clone(),
            permit_signatures: request.permit_signatures.clone(),
        };

        let status = self.tracker.initialize_status(&job).await?;

        // executed plans stay readable for as long as the job payload
        self.cache
            .set(&keys::plan(&plan.id), &plan, self.config.job_ttl)
            .await?;
        self.cache
            .set(&keys::job(&consolidation_id), &job, self.config.job_ttl)
            .await?;

        let options = JobOptions::default()
            .with_priority(JobPriority::Normal)
            .with_job_id(consolidation_id.clone());
        let handle = match self.queue.enqueue("consolidate", job, options).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(consolidation_id = %consolidation_id, error = %e, "Failed to enqueue consolidation");
                self.tracker
                    .mark_consolidation_failed(&consolidation_id, &e.to_string())
                    .await?;
                return Err(e.into());
            }
        };

        info!(
            consolidation_id = %consolidation_id,
            plan_id = %plan.id,
            chains = plan.chain_plans.len(),
            "Consolidation queued"
        );

        Ok(ExecutionTicket {
            consolidation_id,
            status,
            job: handle,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn status(&self, id: &str) -> Result<Option<ConsolidationStatusDetail>, ServiceError> {
        Ok(self.tracker.get_status(id).await?)
    }

    pub async fn user_history(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ConsolidationStatusDetail>, ServiceError> {
        Ok(self.tracker.user_history(user_id, limit, offset).await?)
    }

    pub async fn events(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<ConsolidationEvent>, ServiceError> {
        Ok(self.tracker.events(id, limit).await?)
    }

    /// Outcome of the most recent job run for a consolidation
    pub async fn execution_result(
        &self,
        id: &str,
    ) -> Result<Option<ConsolidationExecuteResult>, ServiceError> {
        Ok(self.cache.get(&keys::result(id)).await?)
    }

    pub async fn plan(&self, plan_id: &str) -> Result<Option<ConsolidationPlan>, ServiceError> {
        Ok(self.cache.get(&keys::plan(plan_id)).await?)
    }

    pub async fn job_data(&self, id: &str) -> Result<Option<ConsolidationJobData>, ServiceError> {
        Ok(self.cache.get(&keys::job(id)).await?)
    }
}

struct PlanTotals {
    input_usd: Decimal,
    swap_fees_usd: Decimal,
    bridge_fees_usd: Decimal,
    gas_usd: Decimal,
    expected_output_usd: Decimal,
    max_bridge_seconds: u64,
}

impl PlanTotals {
    fn of(sources: &[ConsolidationSource], plans: &[ChainConsolidationPlan]) -> Self {
        Self {
            input_usd: sources.iter().map(|s| s.total_value_usd).sum(),
            swap_fees_usd: plans.iter().map(|p| p.swap_fee_usd).sum(),
            bridge_fees_usd: plans
                .iter()
                .filter_map(|p| p.bridge.as_ref())
                .map(|b| b.fee_usd)
                .sum(),
            gas_usd: plans.iter().map(|p| p.swap_gas_estimate_usd).sum(),
            expected_output_usd: plans.iter().map(|p| p.expected_output_usd).sum(),
            max_bridge_seconds: plans
                .iter()
                .filter_map(|p| p.bridge.as_ref())
                .map(|b| b.estimated_time_seconds)
                .max()
                .unwrap_or(0),
        }
    }

    fn fees_usd(&self) -> Decimal {
        self.swap_fees_usd + self.bridge_fees_usd + self.gas_usd
    }

    fn fee_percentage(&self) -> Decimal {
        if self.input_usd > Decimal::ZERO {
            self.fees_usd() / self.input_usd * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        }
    }
}

fn failure_label(error: &ServiceError) -> &'static str {
    match error {
        ServiceError::InvalidRequest { .. } => "invalid_request",
        ServiceError::InsufficientValue { .. } => "insufficient_value",
        ServiceError::NoViableRoutes => "no_viable_routes",
        _ => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dustsweep_optimizer::{MockQuoteSource, OptimizerConfig};
    use dustsweep_queue::InMemoryJobQueue;
    use dustsweep_status::{InMemoryCache, InMemoryStatusTracker};
    use dustsweep_types::{ConsolidationState, DustToken, QuoteSource};
    use num_bigint::BigUint;
    use std::collections::BTreeMap;

    struct Harness {
        service: ConsolidationService,
        quotes: Arc<MockQuoteSource>,
        cache: Arc<InMemoryCache>,
        queue: Arc<InMemoryJobQueue<ConsolidationJobData>>,
    }

    fn harness_with(quotes: MockQuoteSource, config: ServiceConfig) -> Harness {
        let quotes = Arc::new(quotes);
        let cache = Arc::new(InMemoryCache::new());
        let queue = Arc::new(InMemoryJobQueue::new("consolidations"));
        let optimizer = Arc::new(ConsolidationOptimizer::new(
            quotes.clone(),
            OptimizerConfig::default(),
        ));
        let service = ConsolidationService::new(
            optimizer,
            Arc::new(InMemoryStatusTracker::new()),
            cache.clone(),
            queue.clone(),
            config,
        );
        Harness {
            service,
            quotes,
            cache,
            queue,
        }
    }

    fn harness() -> Harness {
        harness_with(MockQuoteSource::new(), ServiceConfig::default())
    }

    fn source(chain: Chain, values: &[i64]) -> QuoteSource {
        QuoteSource {
            chain,
            tokens: values
                .iter()
                .enumerate()
                .map(|(i, cents)| {
                    DustToken::new(
                        format!("0xtoken-{chain}-{i}"),
                        format!("TKN{i}"),
                        18,
                        BigUint::from(10u64).pow(17),
                        Decimal::new(*cents, 2),
                    )
                })
                .collect(),
        }
    }

    fn request(sources: Vec<QuoteSource>) -> ConsolidationQuoteRequest {
        ConsolidationQuoteRequest {
            user_id: "user-1".into(),
            user_address: "0x00000000000000000000000000000000000000aa".into(),
            sources,
            destination_chain: Chain::Base,
            destination_token: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".into(),
            priority: None,
            slippage: None,
        }
    }

    fn execute_request(plan_id: &str, user_id: &str) -> ConsolidationExecuteRequest {
        ConsolidationExecuteRequest {
            plan_id: plan_id.into(),
            user_id: user_id.into(),
            user_address: "0x00000000000000000000000000000000000000aa".into(),
            permit_signatures: BTreeMap::from([(Chain::Arbitrum, "0xpermit".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_quote_builds_and_stores_plan() {
        let h = harness();
        let quote = h
            .service
            .get_quote(&request(vec![
                source(Chain::Arbitrum, &[1500, 1500]),
                source(Chain::Base, &[2000]),
            ]))
            .await
            .unwrap();
        let plan = &quote.plan;

        assert!(plan.id.starts_with("plan-"));
        assert!(quote.warnings.is_empty(), "{:?}", quote.warnings);
        assert_eq!(plan.total_input_value_usd, Decimal::from(50));
        assert_eq!(plan.chain_plans.len(), 2);
        assert_eq!(plan.chain_plans[0].chain, Chain::Base);
        assert_eq!(plan.strategy, PriorityMode::Cost);
        assert_eq!(
            plan.total_fees_usd,
            plan.total_swap_fees_usd + plan.total_bridge_fees_usd + plan.total_gas_usd
        );

        let slowest = plan
            .chain_plans
            .iter()
            .filter_map(|p| p.bridge.as_ref())
            .map(|b| b.estimated_time_seconds)
            .max()
            .unwrap();
        assert_eq!(plan.estimated_total_time_seconds, slowest + 300);
        assert_eq!(plan.expires_at - plan.created_at, 30 * 60 * 1000);

        let stored = h.service.plan(&plan.id).await.unwrap().unwrap();
        assert_eq!(&stored, plan);
    }

    #[tokio::test]
    async fn test_sub_minimum_chains_are_reported_and_not_quoted() {
        let h = harness();
        let quote = h
            .service
            .get_quote(&request(vec![
                source(Chain::Arbitrum, &[3000]),
                source(Chain::Polygon, &[40]),
            ]))
            .await
            .unwrap();

        assert_eq!(quote.plan.chain_plans.len(), 1);
        assert_eq!(
            quote.warnings,
            vec!["Skipped 1 chains with value below $1: polygon".to_string()]
        );
        assert_eq!(h.quotes.route_requests().await, 1);
    }

    #[tokio::test]
    async fn test_all_sources_below_minimum() {
        let h = harness();
        let err = h
            .service
            .get_quote(&request(vec![source(Chain::Arbitrum, &[50, 20])]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientValue { .. }));
        assert_eq!(h.quotes.route_requests().await, 0);
    }

    #[tokio::test]
    async fn test_request_validation() {
        let h = harness_with(
            MockQuoteSource::new(),
            ServiceConfig {
                max_chains_per_consolidation: 2,
                ..ServiceConfig::default()
            },
        );

        let empty = h.service.get_quote(&request(Vec::new())).await;
        assert!(matches!(empty, Err(ServiceError::InvalidRequest { .. })));

        let too_many = h
            .service
            .get_quote(&request(vec![
                source(Chain::Arbitrum, &[500]),
                source(Chain::Optimism, &[500]),
                source(Chain::Polygon, &[500]),
            ]))
            .await;
        assert!(matches!(too_many, Err(ServiceError::InvalidRequest { reason }) if reason.contains("3 > 2")));

        let no_tokens = h
            .service
            .get_quote(&request(vec![source(Chain::Arbitrum, &[])]))
            .await;
        assert!(matches!(no_tokens, Err(ServiceError::InvalidRequest { reason }) if reason.contains("arbitrum")));

        let mut no_address = request(vec![source(Chain::Arbitrum, &[500])]);
        no_address.user_address = String::new();
        assert!(h.service.get_quote(&no_address).await.is_err());

        let mut bad_slippage = request(vec![source(Chain::Arbitrum, &[500])]);
        bad_slippage.slippage = Some(Decimal::from(2));
        assert!(h.service.get_quote(&bad_slippage).await.is_err());
    }

    #[tokio::test]
    async fn test_no_routes_anywhere() {
        let h = harness_with(
            MockQuoteSource::new().without_routes_from(Chain::Arbitrum),
            ServiceConfig::default(),
        );
        let err = h
            .service
            .get_quote(&request(vec![source(Chain::Arbitrum, &[3000])]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NoViableRoutes));
    }

    #[tokio::test]
    async fn test_low_profitability_warning() {
        let h = harness();
        let quote = h
            .service
            .get_quote(&request(vec![source(Chain::Ethereum, &[600])]))
            .await
            .unwrap();
        assert!(quote
            .warnings
            .iter()
            .any(|w| w.starts_with("Low profitability: only")));
    }

    #[tokio::test]
    async fn test_request_slippage_reaches_quote_source() {
        let h = harness();
        let mut req = request(vec![source(Chain::Arbitrum, &[3000])]);
        req.slippage = Some(Decimal::new(1, 2));
        h.service.get_quote(&req).await.unwrap();

        let sent = h.quotes.last_request().await.unwrap();
        assert_eq!(sent.slippage, Decimal::new(1, 2));
    }

    #[tokio::test]
    async fn test_execute_queues_job() {
        let h = harness();
        let quote = h
            .service
            .get_quote(&request(vec![
                source(Chain::Arbitrum, &[3000]),
                source(Chain::Base, &[2000]),
            ]))
            .await
            .unwrap();

        let ticket = h
            .service
            .execute(&execute_request(&quote.plan.id, "user-1"))
            .await
            .unwrap();

        assert!(ticket.consolidation_id.starts_with("cons-"));
        assert_eq!(ticket.job.id, ticket.consolidation_id);
        assert_eq!(ticket.job.priority, JobPriority::Normal);
        assert_eq!(ticket.status.status, ConsolidationState::Queued);
        assert_eq!(ticket.status.total_chains, 2);

        let job = h
            .service
            .job_data(&ticket.consolidation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.plan_id, quote.plan.id);
        assert_eq!(job.permit_signatures.len(), 1);

        let queued = h.queue.dequeue().await.unwrap();
        assert_eq!(queued.payload, job);
    }

    #[tokio::test]
    async fn test_execute_rejects_unknown_plan() {
        let h = harness();
        let err = h
            .service
            .execute(&execute_request("plan-missing", "user-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PlanNotFound(_)));
    }

    #[tokio::test]
    async fn test_execute_rejects_other_user() {
        let h = harness();
        let quote = h
            .service
            .get_quote(&request(vec![source(Chain::Arbitrum, &[3000])]))
            .await
            .unwrap();

        let err = h
            .service
            .execute(&execute_request(&quote.plan.id, "user-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UserMismatch { .. }));
        assert_eq!(h.queue.waiting().await, 0);
    }

    #[tokio::test]
    async fn test_execute_rejects_expired_plan() {
        let h = harness();
        let mut plan = h
            .service
            .get_quote(&request(vec![source(Chain::Arbitrum, &[3000])]))
            .await
            .unwrap()
            .plan;
        plan.expires_at = plan.created_at.saturating_sub(1);
        h.cache
            .set(&keys::plan(&plan.id), &plan, Duration::from_secs(60))
            .await
            .unwrap();

        let err = h
            .service
            .execute(&execute_request(&plan.id, "user-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PlanExpired(_)));
    }

    #[tokio::test]
    async fn test_simulate_reports_missing_routes() {
        let h = harness_with(
            MockQuoteSource::new().without_routes_from(Chain::Optimism),
            ServiceConfig::default(),
        );
        let simulation = h
            .service
            .simulate(&request(vec![
                source(Chain::Arbitrum, &[3000]),
                source(Chain::Optimism, &[3000]),
            ]))
            .await
            .unwrap();

        assert!(!simulation.all_routes_available);
        let optimism = simulation
            .chains
            .iter()
            .find(|c| c.chain == Chain::Optimism)
            .unwrap();
        assert!(!optimism.can_bridge);
        assert_eq!(optimism.errors.len(), 1);
        assert_eq!(h.queue.waiting().await, 0);
    }
}
