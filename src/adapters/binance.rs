//! Binance spot ticker adapter (source A).
//!
//! Binance quotes USDT pairs and returns prices as JSON strings, so the
//! payload is parsed through `Decimal` before crossing into float math.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::http::{build_client, fetch_json, payload_summary};
use crate::domain::PriceVenue;
use crate::error::{Result, TandemError};
use crate::guard::SpotSource;

const DEFAULT_BINANCE_API_BASE: &str = "https://api.binance.com";
const FETCH_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: Decimal,
}

#[derive(Clone)]
pub struct BinanceSpot {
    http: Client,
    base_url: String,
}

impl BinanceSpot {
    pub fn new(base_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_BINANCE_API_BASE)
            .trim_end_matches('/')
            .to_string();
        let http = build_client("tandem-binance-adapter/0.1", timeout_secs)?;

        Ok(Self { http, base_url })
    }

    /// Map a bare asset symbol to the Binance USDT pair, e.g. `btc` → `BTCUSDT`.
    fn pair(symbol: &str) -> String {
        format!("{}USDT", symbol.trim().to_uppercase())
    }

    fn parse_ticker(value: &Value) -> Result<f64> {
        let ticker: TickerResponse =
            serde_json::from_value(value.clone()).map_err(|_| TandemError::SourceUnavailable {
                provider: PriceVenue::Binance.as_str().to_string(),
                reason: format!("bad payload: {}", payload_summary(value)),
            })?;

        ticker
            .price
            .to_f64()
            .ok_or_else(|| TandemError::SourceUnavailable {
                provider: PriceVenue::Binance.as_str().to_string(),
                reason: format!("price not representable: {}", ticker.price),
            })
    }
}

#[async_trait]
impl SpotSource for BinanceSpot {
    fn venue(&self) -> PriceVenue {
        PriceVenue::Binance
    }

    async fn spot_price(&self, symbol: &str) -> Result<f64> {
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.base_url,
            Self::pair(symbol)
        );

        let value = fetch_json(&self.http, PriceVenue::Binance.as_str(), &url, FETCH_ATTEMPTS)
            .await?;
        let price = Self::parse_ticker(&value)?;
        debug!(symbol, price, "binance spot");
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pair_mapping_uppercases_and_suffixes() {
        assert_eq!(BinanceSpot::pair("btc"), "BTCUSDT");
        assert_eq!(BinanceSpot::pair(" eth "), "ETHUSDT");
    }

    #[test]
    fn ticker_price_string_parses() {
        let value = json!({"symbol": "BTCUSDT", "price": "43521.69000000"});
        let price = BinanceSpot::parse_ticker(&value).unwrap();
        assert!((price - 43_521.69).abs() < 1e-9);
    }

    #[test]
    fn missing_price_field_is_unavailable() {
        let value = json!({"symbol": "BTCUSDT"});
        let err = BinanceSpot::parse_ticker(&value).unwrap_err();
        assert!(matches!(err, TandemError::SourceUnavailable { .. }));
    }
}
