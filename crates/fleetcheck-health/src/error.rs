//! Check error types.

use thiserror::Error;

use fleetcheck_balance::BalanceError;
use fleetcheck_core::ConfigError;
use fleetcheck_registry::RegistryError;

/// Errors that abort a check. Each one becomes an `Error` result.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("unknown check: {0}")]
    UnknownCheck(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Balance(#[from] BalanceError),
}

pub type CheckOutcome<T> = Result<T, CheckError>;
