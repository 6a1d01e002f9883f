//! Portfolio-level exposure assessment.
//!
//! Aggregates per-position portfolio percentages into a single risk
//! classification plus deterministic remediation advice.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::config::RiskProfile;

/// Exposure above which the portfolio is no longer considered within limits.
const MAX_TOTAL_EXPOSURE_PCT: f64 = 90.0;
/// Exposure above which a reduction is recommended.
const EXPOSURE_WARNING_PCT: f64 = 80.0;
/// Herfindahl index above which the portfolio counts as concentrated.
const CONCENTRATION_WARNING: f64 = 0.3;

/// One held position, expressed as its share of total portfolio value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub percentage: f64,
}

impl PortfolioPosition {
    pub fn new(percentage: f64) -> Self {
        Self { percentage }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// Classify a (possibly correlation-adjusted) exposure percentage.
    fn from_exposure_pct(exposure: f64) -> Self {
        if exposure >= 80.0 {
            Self::VeryHigh
        } else if exposure >= 60.0 {
            Self::High
        } else if exposure >= 40.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRiskAssessment {
    pub total_crypto_exposure_pct: f64,
    pub max_single_position_pct: f64,
    /// Herfindahl-style index: sum of squared position shares / 100.
    pub concentration_index: f64,
    /// Exposure after the optional correlation adjustment; equals the raw
    /// exposure when no correlation assumption is configured.
    pub adjusted_exposure_pct: f64,
    pub risk_level: RiskLevel,
    pub within_limits: bool,
    /// Deterministic remediation advice; never empty.
    pub recommendations: Vec<String>,
}

pub struct PortfolioAssessor {
    profile: RiskProfile,
    quote_symbol: String,
}

impl PortfolioAssessor {
    pub fn new(profile: RiskProfile, quote_symbol: impl Into<String>) -> Self {
        Self {
            profile,
            quote_symbol: quote_symbol.into().to_uppercase(),
        }
    }

    /// Assess aggregate exposure. The quote-currency balance never counts
    /// toward crypto exposure.
    pub fn assess(
        &self,
        positions: &HashMap<String, PortfolioPosition>,
        assumed_correlation: Option<f64>,
    ) -> PortfolioRiskAssessment {
        let mut shares: Vec<f64> = Vec::with_capacity(positions.len());
        let mut exposure = 0.0;
        let mut max_single = 0.0_f64;

        for (symbol, position) in positions {
            if symbol.to_uppercase() == self.quote_symbol {
                continue;
            }
            shares.push(position.percentage);
            exposure += position.percentage;
            max_single = max_single.max(position.percentage);
        }

        let concentration_index = shares.iter().map(|p| p * p).sum::<f64>() / 100.0;

        let adjusted_exposure_pct = match assumed_correlation {
            Some(rho) if shares.len() > 1 => {
                let n = shares.len() as f64;
                exposure * (1.0 + rho * (n - 1.0) / n)
            }
            _ => exposure,
        };

        let risk_level = RiskLevel::from_exposure_pct(adjusted_exposure_pct);
        let max_position_pct = self.profile.max_position_fraction * 100.0;
        let within_limits =
            max_single <= max_position_pct && exposure <= MAX_TOTAL_EXPOSURE_PCT;

        let recommendations =
            self.recommendations(exposure, max_single, concentration_index, max_position_pct);

        debug!(
            exposure,
            adjusted = adjusted_exposure_pct,
            level = %risk_level,
            within_limits,
            "portfolio assessed"
        );

        PortfolioRiskAssessment {
            total_crypto_exposure_pct: exposure,
            max_single_position_pct: max_single,
            concentration_index,
            adjusted_exposure_pct,
            risk_level,
            within_limits,
            recommendations,
        }
    }

    fn recommendations(
        &self,
        exposure: f64,
        max_single: f64,
        concentration: f64,
        max_position_pct: f64,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        if exposure > EXPOSURE_WARNING_PCT {
            recommendations.push("Consider reducing overall crypto exposure".to_string());
        }
        if max_single > max_position_pct {
            recommendations.push(format!(
                "Largest position exceeds the {max_position_pct:.0}% single-position limit"
            ));
        }
        if concentration > CONCENTRATION_WARNING {
            recommendations
                .push("Portfolio is highly concentrated - consider diversification".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("Portfolio risk levels are within acceptable limits".to_string());
        }

        recommendations
    }
}
