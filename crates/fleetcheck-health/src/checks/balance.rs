//! Workload balance check.

use std::sync::Arc;

use fleetcheck_balance::LoadBalancer;
use fleetcheck_core::{CheckResult, Point};
use fleetcheck_registry::{BoxFuture, RegistryGateway};

use super::{Check, failed};
use crate::error::CheckOutcome;

pub const OVERLOADED_MACHINES_METRIC: &str = "fleet.balance.overloaded_machines";
pub const CANDIDATES_METRIC: &str = "fleet.balance.candidates";

/// Warns with the units that should migrate off overloaded machines.
pub struct BalanceCheck {
    gateway: Arc<dyn RegistryGateway>,
    balancer: LoadBalancer,
}

impl BalanceCheck {
    pub fn new(gateway: Arc<dyn RegistryGateway>, balancer: LoadBalancer) -> Self {
        Self { gateway, balancer }
    }

    async fn evaluate(&self) -> CheckOutcome<CheckResult> {
        let plan = self.balancer.run(self.gateway.as_ref()).await?;

        let result = if plan.is_balanced() {
            CheckResult::ok("The cluster is balanced")
        } else {
            let machines: Vec<&str> = plan
                .overloaded
                .iter()
                .map(|r| r.machine_id.as_str())
                .collect();
            CheckResult::warning(format!(
                "Units to rebalance: {} (overloaded machines: {})",
                plan.candidates.join(","),
                machines.join(",")
            ))
        };

        Ok(result
            .with_point(Point::new(
                OVERLOADED_MACHINES_METRIC,
                plan.overloaded.len() as f64,
            ))
            .with_point(Point::new(CANDIDATES_METRIC, plan.candidates.len() as f64)))
    }
}

impl Check for BalanceCheck {
    fn run(&self) -> BoxFuture<'_, CheckResult> {
        Box::pin(async move { self.evaluate().await.unwrap_or_else(failed) })
    }
}
