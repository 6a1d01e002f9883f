pub mod adapters;
pub mod cli;
pub mod config;
pub mod decision;
pub mod domain;
pub mod error;
pub mod guard;
pub mod pipeline;
pub mod risk;
pub mod sentiment;

pub use config::{AppConfig, RiskProfile};
pub use decision::{DecisionClient, DecisionContext, DecisionEngine};
pub use domain::{
    Action, Decision, DecisionBatch, MatchPolicy, PriceQuote, PriceVenue, ResponseOrigin,
    VerifiedPrice,
};
pub use error::{Result, TandemError};
pub use guard::{PriceGuard, SpotSource};
pub use pipeline::{CycleReport, CycleRequest, Pipeline, SymbolReport, SymbolStatus};
pub use risk::{
    Levels, PortfolioAssessor, PortfolioPosition, PortfolioRiskAssessment, PositionSizer,
    PositionSizing, RiskLevel, Side, SizeRequest, SizingMethod,
};
pub use sentiment::{
    SentimentEntry, SentimentFeed, SentimentMonitor, SentimentOrigin, SentimentReading,
    SentimentStore,
};
