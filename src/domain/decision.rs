//! Canonical trading decisions.
//!
//! Every shape the external model can answer with is reduced to a list of
//! `Decision` records; the `ResponseOrigin` on the batch records which
//! extraction path produced them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Bounded action set. Anything the model says that is not recognizably
/// BUY or SELL coerces to HOLD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }

    /// Lenient coercion used by the normalizer: unknown values become HOLD.
    pub fn from_loose(raw: &str) -> Self {
        Self::from_str(raw).unwrap_or(Self::Hold)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            "HOLD" => Ok(Self::Hold),
            _ => Err("invalid action; expected BUY|SELL|HOLD"),
        }
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::Hold
    }
}

/// A single normalized decision for one symbol.
///
/// `symbol` is uppercase and non-empty; `confidence` is clamped into [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: String,
    pub action: Action,
    pub confidence: f64,
    pub reason: String,
}

impl Decision {
    pub fn new(
        symbol: impl Into<String>,
        action: Action,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            action,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
        }
    }

    /// The safety default emitted when no decision endpoint is configured.
    pub fn safe_hold(symbol: &str, reason: impl Into<String>) -> Self {
        Self::new(symbol, Action::Hold, 0.0, reason)
    }
}

/// Which extraction path produced a decision batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrigin {
    /// No endpoint configured; every symbol got a zero-confidence HOLD.
    SafeHold,
    /// The response carried a structured `decisions` list.
    Structured,
    /// A JSON block was extracted out of prose and coerced.
    ExtractedJson,
    /// Keyword scanning over free text.
    KeywordScan,
    /// The endpoint call itself failed; the batch is empty.
    EndpointError,
}

/// How to reconcile returned decisions with the requested symbol set when
/// no returned decision names a requested symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Drop decisions that match no requested symbol.
    Strict,
    /// Use the first syntactically valid decision as a best-effort
    /// substitute for an unmatched symbol.
    Lenient,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::Strict
    }
}

impl FromStr for MatchPolicy {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            _ => Err("invalid match policy; expected strict|lenient"),
        }
    }
}

/// The outcome of one decision-engine invocation.
///
/// `error` is the explicit marker that distinguishes "the endpoint failed"
/// from "the model chose to say nothing"; decisions are never fabricated on
/// endpoint failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionBatch {
    pub decisions: Vec<Decision>,
    pub origin: ResponseOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DecisionBatch {
    pub fn new(decisions: Vec<Decision>, origin: ResponseOrigin) -> Self {
        Self {
            decisions,
            origin,
            error: None,
        }
    }

    pub fn endpoint_error(message: impl Into<String>) -> Self {
        Self {
            decisions: Vec::new(),
            origin: ResponseOrigin::EndpointError,
            error: Some(message.into()),
        }
    }

    pub fn decision_for(&self, symbol: &str) -> Option<&Decision> {
        let wanted = symbol.to_uppercase();
        self.decisions.iter().find(|d| d.symbol == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_action_coercion_defaults_to_hold() {
        assert_eq!(Action::from_loose("buy"), Action::Buy);
        assert_eq!(Action::from_loose(" SELL "), Action::Sell);
        assert_eq!(Action::from_loose("accumulate"), Action::Hold);
        assert_eq!(Action::from_loose(""), Action::Hold);
    }

    #[test]
    fn decision_constructor_normalizes() {
        let d = Decision::new("btc", Action::Buy, 1.4, "x");
        assert_eq!(d.symbol, "BTC");
        assert_eq!(d.confidence, 1.0);

        let d = Decision::new("eth", Action::Sell, -0.2, "");
        assert_eq!(d.confidence, 0.0);
    }

    #[test]
    fn batch_lookup_is_case_insensitive() {
        let batch = DecisionBatch::new(
            vec![Decision::new("BTC", Action::Hold, 0.5, "")],
            ResponseOrigin::Structured,
        );
        assert!(batch.decision_for("btc").is_some());
        assert!(batch.decision_for("ETH").is_none());
    }

    #[test]
    fn action_serializes_uppercase() {
        let json = serde_json::to_string(&Action::Buy).unwrap();
        assert_eq!(json, "\"BUY\"");
        let back: Action = serde_json::from_str("\"HOLD\"").unwrap();
        assert_eq!(back, Action::Hold);
    }
}
