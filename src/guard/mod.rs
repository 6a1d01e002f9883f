//! Price consensus verification.
//!
//! Downstream pricing trusts only the average of two independent venues, and
//! only when they agree within a deployment-wide tolerance. A price one venue
//! cannot corroborate is refused outright rather than passed along.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{PriceQuote, PriceVenue, VerifiedPrice};
use crate::error::Result;

#[cfg(test)]
use mockall::automock;

/// A read-only spot price lookup for one venue.
///
/// Transport-level retries live behind this seam; callers treat one call as
/// atomic success or failure.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpotSource: Send + Sync {
    fn venue(&self) -> PriceVenue;

    async fn spot_price(&self, symbol: &str) -> Result<f64>;
}

/// Cross-checks two venues and produces consensus prices.
pub struct PriceGuard {
    source_a: Arc<dyn SpotSource>,
    source_b: Arc<dyn SpotSource>,
    tolerance: f64,
}

impl PriceGuard {
    pub fn new(source_a: Arc<dyn SpotSource>, source_b: Arc<dyn SpotSource>, tolerance: f64) -> Self {
        Self {
            source_a,
            source_b,
            tolerance,
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Verify one symbol. Pure aside from the two venue reads: no caching,
    /// no state.
    pub async fn verify(&self, symbol: &str) -> Result<VerifiedPrice> {
        let (a, b) = tokio::join!(
            self.source_a.spot_price(symbol),
            self.source_b.spot_price(symbol)
        );

        let price_a = a.inspect_err(|e| warn!(symbol, error = %e, "source A failed"))?;
        let price_b = b.inspect_err(|e| warn!(symbol, error = %e, "source B failed"))?;

        let quote_a = PriceQuote::new(symbol, self.source_a.venue(), price_a);
        let quote_b = PriceQuote::new(symbol, self.source_b.venue(), price_b);

        let verified = VerifiedPrice::from_quotes(&quote_a, &quote_b, self.tolerance)?;
        debug!(
            symbol = %verified.symbol,
            average = verified.average,
            divergence = verified.divergence(),
            "price verified"
        );
        Ok(verified)
    }

    /// Verify a batch of symbols concurrently. Order-preserving; one
    /// symbol's failure never aborts the rest.
    pub async fn verify_batch(&self, symbols: &[String]) -> Vec<(String, Result<VerifiedPrice>)> {
        let futures = symbols.iter().map(|symbol| async move {
            (symbol.to_uppercase(), self.verify(symbol).await)
        });
        join_all(futures).await
    }
}
