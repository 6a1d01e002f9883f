//! Price primitives: per-source quotes and the consensus price.
//!
//! A `VerifiedPrice` can only be built through `from_quotes`, which enforces
//! the cross-source agreement invariant. Downstream code never sees a raw
//! single-source price.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, TandemError};

/// The two independent spot price venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceVenue {
    Binance,
    Coinbase,
}

impl PriceVenue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Coinbase => "coinbase",
        }
    }
}

impl std::fmt::Display for PriceVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PriceVenue {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "coinbase" => Ok(Self::Coinbase),
            _ => Err("invalid price venue; expected binance|coinbase"),
        }
    }
}

/// A single spot quote from one venue. Ephemeral: created per verification
/// call and discarded once the consensus price is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub venue: PriceVenue,
    pub price: f64,
}

impl PriceQuote {
    pub fn new(symbol: impl Into<String>, venue: PriceVenue, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            venue,
            price,
        }
    }
}

/// A consensus price backed by two independent venues.
///
/// Invariants, enforced at construction:
/// - both source prices are positive and finite
/// - `average = (price_a + price_b) / 2`, finite and positive
/// - `|price_a - price_b| / average <= tolerance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedPrice {
    pub symbol: String,
    pub price_a: f64,
    pub price_b: f64,
    pub average: f64,
}

impl VerifiedPrice {
    /// Build the consensus price from two venue quotes, failing if the
    /// quotes cannot corroborate each other within `tolerance`.
    pub fn from_quotes(a: &PriceQuote, b: &PriceQuote, tolerance: f64) -> Result<Self> {
        let symbol = a.symbol.to_uppercase();
        let average = (a.price + b.price) / 2.0;

        if a.price <= 0.0
            || b.price <= 0.0
            || !a.price.is_finite()
            || !b.price.is_finite()
            || !average.is_finite()
            || average <= 0.0
        {
            return Err(TandemError::InvalidAverage { symbol, average });
        }

        let divergence = (a.price - b.price).abs() / average;
        if divergence > tolerance {
            return Err(TandemError::PriceMismatch {
                symbol,
                price_a: a.price,
                price_b: b.price,
                divergence,
                tolerance,
            });
        }

        Ok(Self {
            symbol,
            price_a: a.price,
            price_b: b.price,
            average,
        })
    }

    /// Relative divergence between the two source prices.
    pub fn divergence(&self) -> f64 {
        (self.price_a - self.price_b).abs() / self.average
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(venue: PriceVenue, price: f64) -> PriceQuote {
        PriceQuote::new("btc", venue, price)
    }

    #[test]
    fn agreeing_quotes_produce_the_average() {
        let a = quote(PriceVenue::Binance, 50_000.0);
        let b = quote(PriceVenue::Coinbase, 50_100.0);

        let verified =
            VerifiedPrice::from_quotes(&a, &b, 0.005).expect("0.2% divergence is in tolerance");
        assert_eq!(verified.symbol, "BTC");
        assert_eq!(verified.average, 50_050.0);
        assert!(verified.divergence() < 0.005);
    }

    #[test]
    fn divergent_quotes_are_a_mismatch() {
        let a = quote(PriceVenue::Binance, 50_000.0);
        let b = quote(PriceVenue::Coinbase, 51_000.0);

        let err = VerifiedPrice::from_quotes(&a, &b, 0.005).unwrap_err();
        assert!(matches!(err, TandemError::PriceMismatch { .. }));
    }

    #[test]
    fn divergence_exactly_at_tolerance_passes() {
        // |100 - 101| / 100.5 ≈ 0.00995; tolerance set to match
        let a = quote(PriceVenue::Binance, 100.0);
        let b = quote(PriceVenue::Coinbase, 101.0);
        let tol = 1.0 / 100.5;

        assert!(VerifiedPrice::from_quotes(&a, &b, tol).is_ok());
    }

    #[test]
    fn non_positive_price_is_an_invalid_average() {
        let a = quote(PriceVenue::Binance, 0.0);
        let b = quote(PriceVenue::Coinbase, 50_000.0);

        let err = VerifiedPrice::from_quotes(&a, &b, 0.005).unwrap_err();
        assert!(matches!(err, TandemError::InvalidAverage { .. }));

        let a = quote(PriceVenue::Binance, -1.0);
        let b = quote(PriceVenue::Coinbase, 50_000.0);
        assert!(matches!(
            VerifiedPrice::from_quotes(&a, &b, 0.005).unwrap_err(),
            TandemError::InvalidAverage { .. }
        ));
    }

    #[test]
    fn non_finite_price_is_an_invalid_average() {
        let a = quote(PriceVenue::Binance, f64::NAN);
        let b = quote(PriceVenue::Coinbase, 50_000.0);
        assert!(matches!(
            VerifiedPrice::from_quotes(&a, &b, 0.005).unwrap_err(),
            TandemError::InvalidAverage { .. }
        ));

        let a = quote(PriceVenue::Binance, f64::INFINITY);
        let b = quote(PriceVenue::Coinbase, 50_000.0);
        assert!(matches!(
            VerifiedPrice::from_quotes(&a, &b, 0.005).unwrap_err(),
            TandemError::InvalidAverage { .. }
        ));
    }

    #[test]
    fn venue_round_trips_through_str() {
        assert_eq!("binance".parse::<PriceVenue>().unwrap(), PriceVenue::Binance);
        assert_eq!(
            "Coinbase".parse::<PriceVenue>().unwrap(),
            PriceVenue::Coinbase
        );
        assert!("kraken".parse::<PriceVenue>().is_err());
    }
}
