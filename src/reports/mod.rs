// Reports module - read-only views over portfolios

pub mod portfolio;

pub use portfolio::{PortfolioSummary, PositionSummary};
