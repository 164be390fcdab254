//! Error handling for Council
//!
//! Defines the typed error cases the engine can raise and establishes a
//! unified Result type using anyhow for context chaining and propagation.
//!
//! Unaffordable trades are not errors, they are declined executions. A
//! failed market data lookup is a `MarketData` error inside the provider,
//! which the engine only ever sees as a missing snapshot.

use thiserror::Error;

/// Core error types for simulation operations
#[derive(Error, Debug)]
pub enum CouncilError {
    #[error("repository error: {0}")]
    Repository(String),

    #[error("market data error: {0}")]
    MarketData(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for engine operations
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = CouncilError::Repository("disk full".to_string());
        assert_eq!(err.to_string(), "repository error: disk full");
    }

    #[test]
    fn test_anyhow_context_chains_errors() {
        use anyhow::Context;
        let result: Result<()> = Err(anyhow::Error::new(CouncilError::Repository(
            "connection reset".to_string(),
        )))
        .context("failed to save portfolio");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("failed to save portfolio"));
        assert!(format!("{:?}", err).contains("connection reset"));
        assert!(err.downcast_ref::<CouncilError>().is_some());
    }

    #[test]
    fn test_council_error_variants() {
        assert!(CouncilError::InvalidInput("x".into())
            .to_string()
            .starts_with("invalid input"));
        assert!(CouncilError::MarketData("x".into())
            .to_string()
            .starts_with("market data error"));
        assert!(CouncilError::Config("x".into())
            .to_string()
            .starts_with("configuration error"));
    }
}
