//! Membership consistency check.

use fleetcheck_core::CheckResult;
use fleetcheck_registry::BoxFuture;

use super::{Check, failed};
use crate::consistency::ConsistencyChecker;
use crate::error::CheckOutcome;

/// Errors with the hostnames of registered machines that are not active.
pub struct ConsistencyCheck {
    checker: ConsistencyChecker,
}

impl ConsistencyCheck {
    pub fn new(checker: ConsistencyChecker) -> Self {
        Self { checker }
    }

    async fn evaluate(&self) -> CheckOutcome<CheckResult> {
        let report = self.checker.run().await?;

        if report.missing_hostnames.is_empty() {
            Ok(CheckResult::ok("All registered machines are active"))
        } else {
            Ok(CheckResult::error(format!(
                "Machines missing from the cluster: {}",
                report.missing_hostnames.join(",")
            )))
        }
    }
}

impl Check for ConsistencyCheck {
    fn run(&self) -> BoxFuture<'_, CheckResult> {
        Box::pin(async move { self.evaluate().await.unwrap_or_else(failed) })
    }
}
