//! Decision engine: one external response in, canonical decisions out.
//!
//! The engine is a small state machine per invocation: no endpoint → safe
//! HOLD per symbol; endpoint error → empty batch with an explicit marker;
//! otherwise the normalizer reduces whatever came back.

pub mod client;
pub mod context;
pub mod normalizer;

use tracing::{error, info, warn};

pub use client::DecisionClient;
pub use context::{DecisionContext, PortfolioContext, PriceContext, RiskContext, SentimentContext};
pub use normalizer::normalize_response;

use crate::config::DecisionConfig;
use crate::domain::{Decision, DecisionBatch, MatchPolicy, ResponseOrigin};
use crate::error::Result;

pub struct DecisionEngine {
    client: Option<DecisionClient>,
    policy: MatchPolicy,
}

impl DecisionEngine {
    pub fn new(client: Option<DecisionClient>, policy: MatchPolicy) -> Self {
        Self { client, policy }
    }

    pub fn from_config(cfg: &DecisionConfig) -> Result<Self> {
        let client = match &cfg.endpoint_url {
            Some(endpoint) => Some(DecisionClient::new(
                endpoint,
                cfg.timeout_secs,
                cfg.max_retries,
            )?),
            None => None,
        };

        Ok(Self::new(client, cfg.match_policy))
    }

    pub fn has_endpoint(&self) -> bool {
        self.client.is_some()
    }

    /// Run one invocation for a batch of symbols.
    ///
    /// Never fails: missing configuration and unintelligible responses both
    /// degrade to bounded output, and an endpoint failure is reported inside
    /// the batch rather than fabricated around.
    pub async fn decide(&self, symbols: &[String], context: &DecisionContext) -> DecisionBatch {
        let Some(client) = &self.client else {
            info!(
                symbols = symbols.len(),
                "no decision endpoint configured, emitting safe holds"
            );
            let decisions = symbols
                .iter()
                .map(|symbol| {
                    Decision::safe_hold(
                        symbol,
                        "decision endpoint not configured; holding by default",
                    )
                })
                .collect();
            return DecisionBatch::new(decisions, ResponseOrigin::SafeHold);
        };

        let body = match client.request(context).await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "decision endpoint call failed");
                return DecisionBatch::endpoint_error(e.to_string());
            }
        };

        let (decisions, origin) = normalize_response(&body, symbols, self.policy);
        if decisions.is_empty() {
            warn!(?origin, "response produced no usable decisions");
        } else {
            info!(count = decisions.len(), ?origin, "decisions normalized");
        }

        DecisionBatch::new(decisions, origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn no_endpoint_yields_one_hold_per_symbol() {
        let engine = DecisionEngine::new(None, MatchPolicy::Strict);
        let context = DecisionContext::new(symbols(&["BTC", "ETH"]));

        let batch = engine.decide(&symbols(&["BTC", "ETH"]), &context).await;

        assert_eq!(batch.origin, ResponseOrigin::SafeHold);
        assert!(batch.error.is_none());
        assert_eq!(batch.decisions.len(), 2);
        for decision in &batch.decisions {
            assert_eq!(decision.action, Action::Hold);
            assert_eq!(decision.confidence, 0.0);
            assert!(decision.reason.contains("not configured"));
        }
        assert_eq!(batch.decisions[0].symbol, "BTC");
        assert_eq!(batch.decisions[1].symbol, "ETH");
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_empty_batch_with_marker() {
        // Nothing listens on this port; connection fails fast
        let client = DecisionClient::new("http://127.0.0.1:9/decision", 1, 1).unwrap();
        let engine = DecisionEngine::new(Some(client), MatchPolicy::Strict);
        let context = DecisionContext::new(symbols(&["BTC"]));

        let batch = engine.decide(&symbols(&["BTC"]), &context).await;

        assert_eq!(batch.origin, ResponseOrigin::EndpointError);
        assert!(batch.decisions.is_empty());
        assert!(batch.error.is_some());
    }

    #[test]
    fn engine_from_default_config_has_no_endpoint() {
        let engine = DecisionEngine::from_config(&DecisionConfig::default()).unwrap();
        assert!(!engine.has_endpoint());
    }
}
