//! Serializable context shipped to the decision model.
//!
//! A snapshot of everything the model is allowed to see: consensus prices,
//! sentiment readings with provenance, portfolio shape, and the current risk
//! assessment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::VerifiedPrice;
use crate::risk::PortfolioRiskAssessment;
use crate::sentiment::{SentimentOrigin, SentimentReading};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceContext {
    pub current_price: f64,
    pub sources: Vec<String>,
    pub verified: bool,
}

impl From<&VerifiedPrice> for PriceContext {
    fn from(verified: &VerifiedPrice) -> Self {
        Self {
            current_price: verified.average,
            sources: vec!["binance".to_string(), "coinbase".to_string()],
            verified: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentContext {
    pub score: f64,
    pub origin: SentimentOrigin,
}

impl From<&SentimentReading> for SentimentContext {
    fn from(reading: &SentimentReading) -> Self {
        Self {
            score: reading.score,
            origin: reading.origin,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioContext {
    pub total_value: f64,
    /// Symbol -> share of portfolio, in percent
    pub positions: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskContext {
    pub risk_level: String,
    pub total_exposure_pct: f64,
    pub within_limits: bool,
    pub recommendations: Vec<String>,
}

impl From<&PortfolioRiskAssessment> for RiskContext {
    fn from(assessment: &PortfolioRiskAssessment) -> Self {
        Self {
            risk_level: assessment.risk_level.to_string(),
            total_exposure_pct: assessment.total_crypto_exposure_pct,
            within_limits: assessment.within_limits,
            recommendations: assessment.recommendations.clone(),
        }
    }
}

/// Complete context for one decision-engine invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionContext {
    pub symbols: Vec<String>,
    pub price_data: HashMap<String, PriceContext>,
    pub sentiment_data: HashMap<String, SentimentContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<PortfolioContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskContext>,
    pub generated_at: DateTime<Utc>,
}

impl DecisionContext {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols: symbols.into_iter().map(|s| s.to_uppercase()).collect(),
            price_data: HashMap::new(),
            sentiment_data: HashMap::new(),
            portfolio: None,
            risk: None,
            generated_at: Utc::now(),
        }
    }

    pub fn with_price(mut self, symbol: &str, verified: &VerifiedPrice) -> Self {
        self.price_data
            .insert(symbol.to_uppercase(), PriceContext::from(verified));
        self
    }

    pub fn with_sentiment(mut self, symbol: &str, reading: &SentimentReading) -> Self {
        self.sentiment_data
            .insert(symbol.to_uppercase(), SentimentContext::from(reading));
        self
    }

    pub fn with_portfolio(mut self, total_value: f64, positions: HashMap<String, f64>) -> Self {
        self.portfolio = Some(PortfolioContext {
            total_value,
            positions,
        });
        self
    }

    pub fn with_assessment(mut self, assessment: &PortfolioRiskAssessment) -> Self {
        self.risk = Some(RiskContext::from(assessment));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceQuote, PriceVenue};

    #[test]
    fn context_serializes_with_expected_keys() {
        let a = PriceQuote::new("BTC", PriceVenue::Binance, 50_000.0);
        let b = PriceQuote::new("BTC", PriceVenue::Coinbase, 50_050.0);
        let verified = VerifiedPrice::from_quotes(&a, &b, 0.005).unwrap();

        let context = DecisionContext::new(vec!["btc".to_string()]).with_price("btc", &verified);

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["symbols"][0], "BTC");
        assert_eq!(json["price_data"]["BTC"]["verified"], true);
        assert!((json["price_data"]["BTC"]["current_price"].as_f64().unwrap() - 50_025.0).abs()
            < 1e-9);
        // Unset sections stay off the wire
        assert!(json.get("portfolio").is_none());
    }
}
