pub mod portfolio;
pub mod sizer;

pub use portfolio::{
    PortfolioAssessor, PortfolioPosition, PortfolioRiskAssessment, RiskLevel,
};
pub use sizer::{Levels, PositionSizer, PositionSizing, Side, SizeRequest, SizingMethod};
