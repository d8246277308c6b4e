//! Check implementations.
//!
//! A check never fails outright: errors are logged and turned into an
//! `Error` result carrying the underlying message.

use std::fmt::Display;

use tracing::error;

use fleetcheck_core::CheckResult;
use fleetcheck_registry::BoxFuture;

pub mod balance;
pub mod cluster;
pub mod consistency;
pub mod metrics;
pub mod units;

pub use balance::BalanceCheck;
pub use cluster::ClusterSizeCheck;
pub use consistency::ConsistencyCheck;
pub use metrics::{MachinesMetric, UnitsMetric};
pub use units::{UnitStatesCheck, UnitsCheck};

/// A named, stateless check invoked by the external runtime.
pub trait Check: Send + Sync {
    fn run(&self) -> BoxFuture<'_, CheckResult>;
}

/// Turn an aborting error into an `Error` result.
pub(crate) fn failed(err: impl Display) -> CheckResult {
    error!(error = %err, "check aborted");
    CheckResult::error(err.to_string())
}
