//! Risk-bounded position sizing and stop/target levels.
//!
//! Three sizing methods produce a soft target quantity; the
//! `max_position_fraction` ceiling is applied after every one of them and is
//! the only hard guarantee callers should rely on.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::config::RiskProfile;
use crate::error::{Result, TandemError};

/// Assumed daily volatility for crypto when no live measure is available.
const BASELINE_DAILY_VOLATILITY: f64 = 0.05;
/// Floor on risk-fraction-of-price in the volatility method, so a stop
/// sitting nearly on the entry cannot blow the factor up.
const MIN_RISK_FRACTION: f64 = 0.01;
/// Payoff ratio assumed by Kelly when the cycle computed no target level.
const DEFAULT_PAYOFF_RATIO: f64 = 2.0;
/// Default stop/target distances as fractions of entry, absent an ATR.
const DEFAULT_STOP_PCT: f64 = 0.05;
const DEFAULT_PROFIT_PCT: f64 = 0.10;
/// ATR multiples for stop and target (2:1 reward:risk).
const ATR_STOP_MULTIPLE: f64 = 2.0;
const ATR_PROFIT_MULTIPLE: f64 = 4.0;

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl FromStr for Side {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Self::Buy),
            "sell" | "short" => Ok(Self::Sell),
            _ => Err("invalid side; expected buy|sell"),
        }
    }
}

/// Selectable sizing algorithm. Unknown names are rejected, not defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMethod {
    FixedRisk,
    Kelly,
    Volatility,
}

impl SizingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedRisk => "fixed_risk",
            Self::Kelly => "kelly",
            Self::Volatility => "volatility",
        }
    }
}

impl std::fmt::Display for SizingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SizingMethod {
    type Err = TandemError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fixed_risk" | "fixed" => Ok(Self::FixedRisk),
            "kelly" => Ok(Self::Kelly),
            "volatility" | "vol" => Ok(Self::Volatility),
            other => Err(TandemError::InvalidInput(format!(
                "unknown sizing method '{other}'; expected fixed_risk|kelly|volatility"
            ))),
        }
    }
}

/// Inputs for one sizing run.
#[derive(Debug, Clone)]
pub struct SizeRequest {
    pub portfolio_value: f64,
    pub entry_price: f64,
    pub stop_price: f64,
    /// Confidence in [0, 1]; values outside are clamped.
    pub confidence: f64,
    pub method: SizingMethod,
    /// Actual target level for this trade, when the cycle computed one.
    /// Kelly derives its payoff ratio from it instead of assuming 2:1.
    pub take_profit: Option<f64>,
}

impl SizeRequest {
    pub fn new(
        portfolio_value: f64,
        entry_price: f64,
        stop_price: f64,
        confidence: f64,
        method: SizingMethod,
    ) -> Self {
        Self {
            portfolio_value,
            entry_price,
            stop_price,
            confidence,
            method,
            take_profit: None,
        }
    }

    pub fn with_take_profit(mut self, take_profit: f64) -> Self {
        self.take_profit = Some(take_profit);
        self
    }
}

/// The sizing result. `notional_value <= portfolio_value * max_position_fraction`
/// holds for every method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    pub quantity: f64,
    pub notional_value: f64,
    pub portfolio_fraction_pct: f64,
    pub max_loss_value: f64,
    pub max_loss_pct: f64,
    pub risk_per_unit: f64,
    pub entry_price: f64,
    pub stop_price: f64,
    pub method: SizingMethod,
}

/// Stop-loss / take-profit levels around an entry.
/// For a buy: `stop_loss < entry < take_profit`; mirrored for a sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub stop_distance: f64,
    pub profit_distance: f64,
    pub reward_risk_ratio: f64,
}

pub struct PositionSizer {
    profile: RiskProfile,
}

impl PositionSizer {
    pub fn new(profile: RiskProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &RiskProfile {
        &self.profile
    }

    /// Compute a bounded position size.
    ///
    /// Fails with `InvalidInput` on non-positive or non-finite prices and
    /// portfolio value, and when the stop sits exactly on the entry (no
    /// risk per unit to size against).
    pub fn size(&self, req: &SizeRequest) -> Result<PositionSizing> {
        for (name, value) in [
            ("portfolio_value", req.portfolio_value),
            ("entry_price", req.entry_price),
            ("stop_price", req.stop_price),
        ] {
            if value <= 0.0 || !value.is_finite() {
                return Err(TandemError::InvalidInput(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if let Some(tp) = req.take_profit {
            if tp <= 0.0 || !tp.is_finite() {
                return Err(TandemError::InvalidInput(format!(
                    "take_profit must be positive and finite, got {tp}"
                )));
            }
        }

        let confidence = if req.confidence.is_finite() {
            req.confidence.clamp(0.0, 1.0)
        } else {
            return Err(TandemError::InvalidInput(
                "confidence must be finite".to_string(),
            ));
        };

        let risk_per_unit = (req.entry_price - req.stop_price).abs();
        if risk_per_unit == 0.0 {
            return Err(TandemError::InvalidInput(
                "stop price equals entry price; risk per unit is zero".to_string(),
            ));
        }
        let risk_fraction = risk_per_unit / req.entry_price;

        let raw_quantity = match req.method {
            SizingMethod::FixedRisk => {
                self.fixed_risk_quantity(req.portfolio_value, risk_per_unit, confidence)
            }
            SizingMethod::Kelly => self.kelly_quantity(req, risk_per_unit, risk_fraction, confidence),
            SizingMethod::Volatility => {
                self.volatility_quantity(req, risk_fraction, confidence)
            }
        };

        // Hard ceiling regardless of method.
        let max_quantity =
            req.portfolio_value * self.profile.max_position_fraction / req.entry_price;
        let quantity = raw_quantity.min(max_quantity).max(0.0);

        let notional_value = quantity * req.entry_price;
        let max_loss_value = quantity * risk_per_unit;

        debug!(
            method = %req.method,
            quantity,
            notional_value,
            capped = raw_quantity > max_quantity,
            "position sized"
        );

        Ok(PositionSizing {
            quantity,
            notional_value,
            portfolio_fraction_pct: notional_value / req.portfolio_value * 100.0,
            max_loss_value,
            max_loss_pct: max_loss_value / req.portfolio_value * 100.0,
            risk_per_unit,
            entry_price: req.entry_price,
            stop_price: req.stop_price,
            method: req.method,
        })
    }

    /// Risk a fixed slice of the portfolio regardless of entry distance.
    fn fixed_risk_quantity(&self, portfolio_value: f64, risk_per_unit: f64, confidence: f64) -> f64 {
        portfolio_value * self.profile.risk_per_trade_fraction * confidence / risk_per_unit
    }

    /// Kelly criterion with the payoff ratio taken from the trade's actual
    /// levels when available, capped by the per-trade risk budget.
    fn kelly_quantity(
        &self,
        req: &SizeRequest,
        risk_per_unit: f64,
        risk_fraction: f64,
        confidence: f64,
    ) -> f64 {
        let p = confidence.clamp(0.1, 0.9);
        let q = 1.0 - p;

        let payoff_ratio = req
            .take_profit
            .map(|tp| (tp - req.entry_price).abs() / risk_per_unit)
            .unwrap_or(DEFAULT_PAYOFF_RATIO);

        let kelly_fraction = if payoff_ratio > 0.0 {
            ((payoff_ratio * p - q) / payoff_ratio)
                .clamp(0.0, self.profile.max_position_fraction)
        } else {
            0.0
        };

        let final_fraction =
            kelly_fraction.min(self.profile.risk_per_trade_fraction / risk_fraction);

        req.portfolio_value * final_fraction / req.entry_price
    }

    /// Scale the per-trade risk budget by how calm the entry-to-stop
    /// distance looks against baseline crypto volatility.
    fn volatility_quantity(&self, req: &SizeRequest, risk_fraction: f64, confidence: f64) -> f64 {
        let volatility_factor = BASELINE_DAILY_VOLATILITY / risk_fraction.max(MIN_RISK_FRACTION);
        let target_risk = req.portfolio_value * self.profile.risk_per_trade_fraction;
        target_risk * volatility_factor * confidence / req.entry_price
    }

    /// Stop-loss / take-profit levels around an entry.
    ///
    /// With an ATR: 2x ATR stop, 4x ATR target. Without: 5% / 10% of entry.
    /// A non-positive ATR is treated as absent.
    pub fn levels(&self, entry_price: f64, side: Side, atr: Option<f64>) -> Result<Levels> {
        if entry_price <= 0.0 || !entry_price.is_finite() {
            return Err(TandemError::InvalidInput(format!(
                "entry_price must be positive and finite, got {entry_price}"
            )));
        }

        let atr = atr.filter(|a| *a > 0.0 && a.is_finite());
        let (stop_distance, profit_distance) = match atr {
            Some(atr) => (atr * ATR_STOP_MULTIPLE, atr * ATR_PROFIT_MULTIPLE),
            None => (
                entry_price * DEFAULT_STOP_PCT,
                entry_price * DEFAULT_PROFIT_PCT,
            ),
        };

        let (stop_loss, take_profit) = match side {
            Side::Buy => (entry_price - stop_distance, entry_price + profit_distance),
            Side::Sell => (entry_price + stop_distance, entry_price - profit_distance),
        };

        Ok(Levels {
            stop_loss,
            take_profit,
            stop_distance,
            profit_distance,
            reward_risk_ratio: profit_distance / stop_distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> RiskProfile {
        RiskProfile {
            max_position_fraction: 0.10,
            risk_per_trade_fraction: 0.02,
            max_drawdown_fraction: 0.15,
        }
    }

    fn sizer() -> PositionSizer {
        PositionSizer::new(profile())
    }

    #[test]
    fn fixed_risk_quantity_is_exact_when_uncapped() {
        // risk budget 100k * 2% = 2000; risk per unit 50 -> 40 units
        let req = SizeRequest::new(100_000.0, 100.0, 50.0, 1.0, SizingMethod::FixedRisk);
        let sizing = sizer().size(&req).unwrap();
        assert!((sizing.quantity - 40.0).abs() < 1e-9);
        assert!((sizing.max_loss_value - 2_000.0).abs() < 1e-9);
        assert!((sizing.max_loss_pct - 2.0).abs() < 1e-9);
    }

    #[test]
    fn hard_cap_holds_for_every_method() {
        let profile = RiskProfile {
            max_position_fraction: 0.10,
            risk_per_trade_fraction: 0.05,
            max_drawdown_fraction: 0.15,
        };
        let sizer = PositionSizer::new(profile);
        let cap = 100_000.0 * 0.10;

        for method in [
            SizingMethod::FixedRisk,
            SizingMethod::Kelly,
            SizingMethod::Volatility,
        ] {
            // A stop almost on the entry makes every formula explode past the cap
            let req = SizeRequest::new(100_000.0, 100.0, 99.9, 0.9, method);
            let sizing = sizer.size(&req).unwrap();
            assert!(
                sizing.notional_value <= cap + 1e-6,
                "{method} notional {} exceeds cap {cap}",
                sizing.notional_value
            );
            assert!(sizing.quantity >= 0.0);
        }
    }

    #[test]
    fn kelly_at_low_confidence_never_exceeds_fixed_risk() {
        for confidence in [0.0, 0.05, 0.1] {
            let kelly = sizer()
                .size(&SizeRequest::new(
                    50_000.0,
                    200.0,
                    190.0,
                    confidence,
                    SizingMethod::Kelly,
                ))
                .unwrap();
            let fixed = sizer()
                .size(&SizeRequest::new(
                    50_000.0,
                    200.0,
                    190.0,
                    confidence,
                    SizingMethod::FixedRisk,
                ))
                .unwrap();
            // p clamps to 0.1 -> negative Kelly edge -> zero quantity
            assert!(kelly.quantity <= fixed.quantity + 1e-12);
            assert_eq!(kelly.quantity, 0.0);
        }
    }

    #[test]
    fn kelly_payoff_ratio_derives_from_take_profit() {
        let profile = RiskProfile {
            max_position_fraction: 0.50,
            risk_per_trade_fraction: 0.02,
            max_drawdown_fraction: 0.15,
        };
        let sizer = PositionSizer::new(profile);

        // entry 100, stop 99: risk fraction 0.01, budget cap 2.0 (not binding)
        let base = SizeRequest::new(100_000.0, 100.0, 99.0, 0.6, SizingMethod::Kelly);

        // Default 2:1 payoff: f = (2*0.6 - 0.4) / 2 = 0.4
        let default_b = sizer.size(&base).unwrap();
        assert!((default_b.quantity - 100_000.0 * 0.4 / 100.0).abs() < 1e-9);

        // Actual 3:1 payoff from levels: f = (3*0.6 - 0.4) / 3 = 0.4667
        let derived_b = sizer.size(&base.clone().with_take_profit(103.0)).unwrap();
        assert!((derived_b.quantity - 100_000.0 * (1.4 / 3.0) / 100.0).abs() < 1e-9);
        assert!(derived_b.quantity > default_b.quantity);
    }

    #[test]
    fn volatility_quantity_is_exact_when_uncapped() {
        // risk fraction 0.02 -> factor 2.5; 10_000 * 0.02 * 2.5 * 0.8 / 100 = 4
        let req = SizeRequest::new(10_000.0, 100.0, 98.0, 0.8, SizingMethod::Volatility);
        let sizing = sizer().size(&req).unwrap();
        assert!((sizing.quantity - 4.0).abs() < 1e-9);
    }

    #[test]
    fn volatility_risk_fraction_is_floored() {
        // risk fraction 0.001 floors to 0.01 -> factor 5, not 50
        let req = SizeRequest::new(10_000.0, 100.0, 99.9, 1.0, SizingMethod::Volatility);
        let sizing = sizer().size(&req).unwrap();
        // 10_000 * 0.02 * 5 / 100 = 10, capped at 0.1 * 10_000 / 100 = 10
        assert!((sizing.quantity - 10.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let cases = [
            SizeRequest::new(0.0, 100.0, 95.0, 0.5, SizingMethod::FixedRisk),
            SizeRequest::new(10_000.0, 0.0, 95.0, 0.5, SizingMethod::FixedRisk),
            SizeRequest::new(10_000.0, 100.0, -5.0, 0.5, SizingMethod::FixedRisk),
            SizeRequest::new(10_000.0, f64::NAN, 95.0, 0.5, SizingMethod::FixedRisk),
            // stop exactly on entry
            SizeRequest::new(10_000.0, 100.0, 100.0, 0.5, SizingMethod::FixedRisk),
        ];
        for req in cases {
            assert!(matches!(
                sizer().size(&req).unwrap_err(),
                TandemError::InvalidInput(_)
            ));
        }
    }

    #[test]
    fn unknown_method_name_is_invalid_input() {
        let err = "martingale".parse::<SizingMethod>().unwrap_err();
        assert!(matches!(err, TandemError::InvalidInput(_)));
        assert_eq!("fixed_risk".parse::<SizingMethod>().unwrap(), SizingMethod::FixedRisk);
        assert_eq!("vol".parse::<SizingMethod>().unwrap(), SizingMethod::Volatility);
    }

    #[test]
    fn default_levels_for_a_long() {
        let levels = sizer().levels(100.0, Side::Buy, None).unwrap();
        assert_eq!(levels.stop_loss, 95.0);
        assert_eq!(levels.take_profit, 110.0);
        assert_eq!(levels.reward_risk_ratio, 2.0);
    }

    #[test]
    fn atr_levels_for_a_long() {
        let levels = sizer().levels(100.0, Side::Buy, Some(2.0)).unwrap();
        assert_eq!(levels.stop_loss, 96.0);
        assert_eq!(levels.take_profit, 108.0);
        assert_eq!(levels.stop_distance, 4.0);
        assert_eq!(levels.profit_distance, 8.0);
        assert_eq!(levels.reward_risk_ratio, 2.0);
    }

    #[test]
    fn levels_mirror_for_a_short() {
        let levels = sizer().levels(100.0, Side::Sell, None).unwrap();
        assert_eq!(levels.stop_loss, 105.0);
        assert_eq!(levels.take_profit, 90.0);
        assert!(levels.take_profit < 100.0 && 100.0 < levels.stop_loss);
    }

    #[test]
    fn non_positive_atr_falls_back_to_defaults() {
        let levels = sizer().levels(100.0, Side::Buy, Some(0.0)).unwrap();
        assert_eq!(levels.stop_loss, 95.0);
        assert_eq!(levels.take_profit, 110.0);
    }

    #[test]
    fn long_level_ordering_invariant() {
        for entry in [0.5, 42.0, 68_000.0] {
            let levels = sizer().levels(entry, Side::Buy, None).unwrap();
            assert!(levels.stop_loss < entry && entry < levels.take_profit);
        }
    }
}
