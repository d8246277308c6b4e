//! Load balancer error types.

use thiserror::Error;

/// Errors that can occur while planning a rebalance.
#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("configuration error: {0}")]
    Config(#[from] fleetcheck_core::ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] fleetcheck_registry::RegistryError),
}

pub type BalanceResult<T> = Result<T, BalanceError>;
