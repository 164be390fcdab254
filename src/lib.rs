//! Council - portfolio simulation engine
//!
//! Six investment strategies each manage their own simulated portfolio per
//! owner. A run analyzes the market through a fundamentals provider, turns
//! the strategy's recommendations into trades at current prices, and records
//! everything through a repository.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod notify;
pub mod pricing;
pub mod reports;
pub mod strategies;
pub mod utils;
