//! CLI command implementations. Thin plumbing over the library: parse
//! arguments, wire components from config, print results.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::{BinanceSpot, CoinbaseSpot, LunarCrushFeed};
use crate::config::AppConfig;
use crate::domain::VerifiedPrice;
use crate::error::{Result, TandemError};
use crate::guard::PriceGuard;
use crate::pipeline::{CycleRequest, Pipeline};
use crate::risk::{
    PortfolioAssessor, PortfolioPosition, PositionSizer, Side, SizeRequest, SizingMethod,
};
use crate::sentiment::{SentimentFeed, SentimentMonitor, SentimentStore};

fn price_guard(cfg: &AppConfig) -> Result<PriceGuard> {
    Ok(PriceGuard::new(
        Arc::new(BinanceSpot::new(
            cfg.price_guard.binance_url.as_deref(),
            cfg.price_guard.timeout_secs,
        )?),
        Arc::new(CoinbaseSpot::new(
            cfg.price_guard.coinbase_url.as_deref(),
            cfg.price_guard.timeout_secs,
        )?),
        cfg.price_guard.tolerance,
    ))
}

/// Verify consensus prices for a list of symbols.
pub async fn verify_prices(cfg: &AppConfig, symbols: &[String]) -> Result<()> {
    let guard = price_guard(cfg)?;
    let results = guard.verify_batch(symbols).await;

    for (symbol, result) in results {
        match result {
            Ok(VerifiedPrice {
                price_a,
                price_b,
                average,
                ..
            }) => {
                println!("{symbol}: binance={price_a:.2} coinbase={price_b:.2} avg={average:.2}");
            }
            Err(e) => println!("{symbol}: price verification failed: {e}"),
        }
    }
    Ok(())
}

/// Show the sentiment reading for one symbol (live with cache fallback).
pub async fn show_sentiment(cfg: &AppConfig, symbol: &str) -> Result<()> {
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

    let monitor = SentimentMonitor::new(feed, store);
    match monitor.get(symbol).await {
        Some(reading) => println!(
            "{}: score={:.2} origin={:?} observed_at={}",
            symbol.to_uppercase(),
            reading.score,
            reading.origin,
            reading.observed_at
        ),
        None => println!("{}: no sentiment available", symbol.to_uppercase()),
    }
    Ok(())
}

/// Size a position and print the result as JSON.
#[allow(clippy::too_many_arguments)]
pub fn size_position(
    cfg: &AppConfig,
    portfolio_value: f64,
    entry_price: f64,
    stop_price: f64,
    confidence: f64,
    method: SizingMethod,
    take_profit: Option<f64>,
) -> Result<()> {
    let sizer = PositionSizer::new(cfg.risk);
    let mut request = SizeRequest::new(portfolio_value, entry_price, stop_price, confidence, method);
    if let Some(tp) = take_profit {
        request = request.with_take_profit(tp);
    }

    let sizing = sizer.size(&request)?;
    println!("{}", serde_json::to_string_pretty(&sizing)?);
    Ok(())
}

/// Compute stop/target levels and print the result as JSON.
pub fn show_levels(cfg: &AppConfig, entry_price: f64, side: Side, atr: Option<f64>) -> Result<()> {
    let sizer = PositionSizer::new(cfg.risk);
    let levels = sizer.levels(entry_price, side, atr)?;
    println!("{}", serde_json::to_string_pretty(&levels)?);
    Ok(())
}

/// Assess a portfolio given `SYM=PCT` pairs, e.g. `BTC=30,ETH=25,ADA=10`.
pub fn assess_portfolio(cfg: &AppConfig, positions_spec: &str) -> Result<()> {
    let positions = parse_positions(positions_spec)?;
    let assessor = PortfolioAssessor::new(cfg.risk, cfg.portfolio.quote_symbol.clone());
    let assessment = assessor.assess(&positions, cfg.portfolio.assumed_correlation);
    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(())
}

/// Run one full analysis cycle and print the report as JSON.
pub async fn run_cycle(
    cfg: &AppConfig,
    symbols: &[String],
    portfolio_value: f64,
    positions_spec: Option<&str>,
    method: SizingMethod,
) -> Result<()> {
    let positions = match positions_spec {
        Some(spec) => parse_positions(spec)?,
        None => HashMap::new(),
    };

    let pipeline = Pipeline::from_config(cfg).await?;
    let report = pipeline
        .run_cycle(&CycleRequest {
            symbols: symbols.to_vec(),
            portfolio_value,
            positions,
            method,
        })
        .await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Parse `SYM=PCT` pairs separated by commas.
pub fn parse_positions(spec: &str) -> Result<HashMap<String, PortfolioPosition>> {
    let mut positions = HashMap::new();

    for pair in spec.split(',').filter(|p| !p.trim().is_empty()) {
        let (symbol, pct) = pair.split_once('=').ok_or_else(|| {
            TandemError::InvalidInput(format!(
                "bad position '{pair}'; expected SYMBOL=PERCENT"
            ))
        })?;

        let percentage: f64 = pct.trim().parse().map_err(|_| {
            TandemError::InvalidInput(format!("bad percentage '{pct}' for {symbol}"))
        })?;
        if !(0.0..=100.0).contains(&percentage) {
            return Err(TandemError::InvalidInput(format!(
                "percentage {percentage} for {symbol} is outside [0, 100]"
            )));
        }

        positions.insert(
            symbol.trim().to_uppercase(),
            PortfolioPosition::new(percentage),
        );
    }

    Ok(positions)
}
