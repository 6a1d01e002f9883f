//! One analysis cycle: verify prices, gather sentiment, assess the book,
//! consult the decision model, and size what survives.
//!
//! Per-symbol failures degrade that symbol only; the cycle always completes
//! and reports every requested symbol.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::adapters::{BinanceSpot, CoinbaseSpot, LunarCrushFeed};
use crate::decision::{DecisionContext, DecisionEngine};
use crate::domain::{Decision, DecisionBatch, VerifiedPrice};
use crate::error::Result;
use crate::guard::PriceGuard;
use crate::risk::{
    Levels, PortfolioAssessor, PortfolioPosition, PortfolioRiskAssessment, PositionSizer,
    PositionSizing, Side, SizeRequest, SizingMethod,
};
use crate::sentiment::{SentimentFeed, SentimentMonitor, SentimentReading, SentimentStore};

/// Confidence used for sizing when the decision model produced nothing for
/// a symbol (endpoint error, strict-matching drop).
const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Inputs for one cycle run.
#[derive(Debug, Clone)]
pub struct CycleRequest {
    pub symbols: Vec<String>,
    pub portfolio_value: f64,
    /// Current book as symbol -> share of portfolio (percent)
    pub positions: HashMap<String, PortfolioPosition>,
    pub method: SizingMethod,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SymbolStatus {
    /// Price verified; analysis ran end to end.
    Analyzed,
    /// Consensus failed; the symbol was excluded from sizing.
    PriceRejected { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub status: SymbolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<VerifiedPrice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Levels>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizing: Option<PositionSizing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub symbols: Vec<SymbolReport>,
    pub assessment: PortfolioRiskAssessment,
    pub decisions: DecisionBatch,
}

pub struct Pipeline {
    guard: PriceGuard,
    sentiment: SentimentMonitor,
    sizer: PositionSizer,
    assessor: PortfolioAssessor,
    engine: DecisionEngine,
    assumed_correlation: Option<f64>,
}

impl Pipeline {
    pub fn new(
        guard: PriceGuard,
        sentiment: SentimentMonitor,
        sizer: PositionSizer,
        assessor: PortfolioAssessor,
        engine: DecisionEngine,
        assumed_correlation: Option<f64>,
    ) -> Self {
        Self {
            guard,
            sentiment,
            sizer,
            assessor,
            engine,
            assumed_correlation,
        }
    }

    /// Wire the full pipeline from configuration: live adapters, persisted
    /// sentiment cache, and the decision endpoint when one is configured.
    pub async fn from_config(cfg: &AppConfig) -> Result<Self> {
        let guard = PriceGuard::new(
            Arc::new(BinanceSpot::new(
                cfg.price_guard.binance_url.as_deref(),
                cfg.price_guard.timeout_secs,
            )?),
            Arc::new(CoinbaseSpot::new(
                cfg.price_guard.coinbase_url.as_deref(),
                cfg.price_guard.timeout_secs,
            )?),
            cfg.price_guard.tolerance,
        );

        let feed: Option<Arc<dyn SentimentFeed>> = match &cfg.sentiment.api_key {
            Some(key) => Some(Arc::new(LunarCrushFeed::new(
                key,
                cfg.sentiment.base_url.as_deref(),
                cfg.sentiment.timeout_secs,
            )?)),
            None => None,
        };
        let store = SentimentStore::new(cfg.sentiment.cache_path.clone());
        store.load().await?;

        Ok(Self::new(
            guard,
            SentimentMonitor::new(feed, store),
            PositionSizer::new(cfg.risk),
            PortfolioAssessor::new(cfg.risk, cfg.portfolio.quote_symbol.clone()),
            DecisionEngine::from_config(&cfg.decision)?,
            cfg.portfolio.assumed_correlation,
        ))
    }

    /// Run one full analysis cycle.
    pub async fn run_cycle(&self, request: &CycleRequest) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%cycle_id, symbols = request.symbols.len(), "cycle started");

        // Price consensus for the whole batch, concurrently.
        let verified_batch = self.guard.verify_batch(&request.symbols).await;

        // Sentiment and context for the symbols whose prices held up.
        let mut context = DecisionContext::new(request.symbols.clone());
        let mut sentiments: HashMap<String, SentimentReading> = HashMap::new();
        for (symbol, result) in &verified_batch {
            if let Ok(verified) = result {
                context = context.with_price(symbol, verified);
                if let Some(reading) = self.sentiment.get(symbol).await {
                    context = context.with_sentiment(symbol, &reading);
                    sentiments.insert(symbol.clone(), reading);
                }
            }
        }

        let assessment = self
            .assessor
            .assess(&request.positions, self.assumed_correlation);
        context = context
            .with_portfolio(
                request.portfolio_value,
                request
                    .positions
                    .iter()
                    .map(|(symbol, p)| (symbol.clone(), p.percentage))
                    .collect(),
            )
            .with_assessment(&assessment);

        let decisions = self.engine.decide(&request.symbols, &context).await;

        // Per-symbol synthesis: levels and sizing from the verified price,
        // confidence taken from the model's decision where there is one.
        let mut reports = Vec::with_capacity(verified_batch.len());
        for (symbol, result) in verified_batch {
            let report = match result {
                Ok(verified) => {
                    let decision = decisions.decision_for(&symbol).cloned();
                    let confidence = decision
                        .as_ref()
                        .map(|d| d.confidence)
                        .unwrap_or(NEUTRAL_CONFIDENCE);

                    let levels = self
                        .sizer
                        .levels(verified.average, Side::Buy, None)
                        .ok();

                    let sizing = levels.as_ref().and_then(|levels| {
                        let req = SizeRequest::new(
                            request.portfolio_value,
                            verified.average,
                            levels.stop_loss,
                            confidence,
                            request.method,
                        )
                        .with_take_profit(levels.take_profit);

                        match self.sizer.size(&req) {
                            Ok(sizing) => Some(sizing),
                            Err(e) => {
                                warn!(symbol = %symbol, error = %e, "sizing failed");
                                None
                            }
                        }
                    });

                    SymbolReport {
                        symbol,
                        status: SymbolStatus::Analyzed,
                        sentiment: sentiments.remove(&verified.symbol),
                        verified: Some(verified),
                        levels,
                        sizing,
                        decision,
                    }
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "price rejected");
                    SymbolReport {
                        symbol,
                        status: SymbolStatus::PriceRejected {
                            reason: e.to_string(),
                        },
                        verified: None,
                        sentiment: None,
                        levels: None,
                        sizing: None,
                        decision: None,
                    }
                }
            };
            reports.push(report);
        }

        info!(
            %cycle_id,
            analyzed = reports
                .iter()
                .filter(|r| matches!(r.status, SymbolStatus::Analyzed))
                .count(),
            rejected = reports
                .iter()
                .filter(|r| matches!(r.status, SymbolStatus::PriceRejected { .. }))
                .count(),
            "cycle finished"
        );

        CycleReport {
            cycle_id,
            started_at,
            symbols: reports,
            assessment,
            decisions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskProfile;
    use crate::domain::{Action, MatchPolicy, PriceVenue, ResponseOrigin};
    use crate::guard::MockSpotSource;
    use std::path::PathBuf;

    fn scratch_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "tandem_pipeline_{}_{}.json",
            tag,
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    fn offline_pipeline(price_a: f64, price_b: f64, tag: &str) -> Pipeline {
        let mut source_a = MockSpotSource::new();
        source_a.expect_venue().return_const(PriceVenue::Binance);
        source_a.expect_spot_price().returning(move |_| Ok(price_a));

        let mut source_b = MockSpotSource::new();
        source_b.expect_venue().return_const(PriceVenue::Coinbase);
        source_b.expect_spot_price().returning(move |_| Ok(price_b));

        let profile = RiskProfile::default();
        Pipeline::new(
            PriceGuard::new(Arc::new(source_a), Arc::new(source_b), 0.005),
            SentimentMonitor::new(None, SentimentStore::new(scratch_path(tag))),
            PositionSizer::new(profile),
            PortfolioAssessor::new(profile, "USD"),
            DecisionEngine::new(None, MatchPolicy::Strict),
            None,
        )
    }

    fn request(symbols: &[&str]) -> CycleRequest {
        CycleRequest {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            portfolio_value: 100_000.0,
            positions: HashMap::from([
                ("BTC".to_string(), PortfolioPosition::new(30.0)),
                ("ETH".to_string(), PortfolioPosition::new(25.0)),
            ]),
            method: SizingMethod::FixedRisk,
        }
    }

    #[tokio::test]
    async fn offline_cycle_reports_every_symbol() {
        let pipeline = offline_pipeline(50_000.0, 50_050.0, "full");
        let report = pipeline.run_cycle(&request(&["BTC", "ETH"])).await;

        assert_eq!(report.symbols.len(), 2);
        assert_eq!(report.decisions.origin, ResponseOrigin::SafeHold);

        for symbol in &report.symbols {
            assert!(matches!(symbol.status, SymbolStatus::Analyzed));
            let verified = symbol.verified.as_ref().unwrap();
            assert_eq!(verified.average, 50_025.0);

            let levels = symbol.levels.as_ref().unwrap();
            assert!(levels.stop_loss < verified.average);

            // Safe-hold confidence 0 sizes to zero quantity
            let decision = symbol.decision.as_ref().unwrap();
            assert_eq!(decision.action, Action::Hold);
            assert_eq!(symbol.sizing.as_ref().unwrap().quantity, 0.0);
        }
    }

    #[tokio::test]
    async fn rejected_price_degrades_only_that_symbol() {
        // Sources disagree by 2%: every symbol is rejected by consensus,
        // but the cycle still completes with per-symbol statuses.
        let pipeline = offline_pipeline(50_000.0, 51_000.0, "reject");
        let report = pipeline.run_cycle(&request(&["BTC"])).await;

        assert_eq!(report.symbols.len(), 1);
        match &report.symbols[0].status {
            SymbolStatus::PriceRejected { reason } => {
                assert!(reason.contains("mismatch"), "unexpected reason: {reason}")
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(report.symbols[0].sizing.is_none());

        // Portfolio assessment is independent of price verification
        assert!(report.assessment.total_crypto_exposure_pct > 0.0);
    }

    #[tokio::test]
    async fn hard_cap_holds_through_the_pipeline() {
        let pipeline = offline_pipeline(50_000.0, 50_050.0, "cap");
        let mut req = request(&["BTC"]);
        req.method = SizingMethod::Volatility;
        let report = pipeline.run_cycle(&req).await;

        if let Some(sizing) = &report.symbols[0].sizing {
            assert!(sizing.notional_value <= req.portfolio_value * 0.10 + 1e-6);
        }
    }
}
