//! Named check lookup, built once at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use fleetcheck_balance::LoadBalancer;
use fleetcheck_core::{CheckResult, FleetCheckConfig};
use fleetcheck_registry::RegistryGateway;

use crate::checks::{
    BalanceCheck, Check, ClusterSizeCheck, ConsistencyCheck, MachinesMetric, UnitStatesCheck,
    UnitsCheck, UnitsMetric,
};
use crate::consistency::ConsistencyChecker;
use crate::error::{CheckError, CheckOutcome};

/// Maps check names to check instances.
#[derive(Default)]
pub struct CheckRegistry {
    checks: BTreeMap<String, Box<dyn Check>>,
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("checks", &self.checks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fleet check, wired to one gateway. The cluster-size gate is
    /// also registered as `fleet-cluster-size-metric`.
    pub fn standard(
        config: &FleetCheckConfig,
        gateway: Arc<dyn RegistryGateway>,
    ) -> CheckOutcome<Self> {
        config.validate()?;

        let balancer = LoadBalancer::from_config(config)?;
        let cluster_size = ClusterSizeCheck::new(gateway.clone(), config.cluster_size_threshold());
        let consistency = ConsistencyChecker::new(
            gateway.clone(),
            &config.namespace,
            config.request_timeout(),
        );

        let mut registry = Self::new();
        registry.register("fleet-units-checks", Box::new(UnitsCheck::new(gateway.clone())));
        registry.register(
            "fleet-unit-states-checks",
            Box::new(UnitStatesCheck::new(gateway.clone(), config.unit_states_blacklist()?)),
        );
        registry.register("fleet-cluster-size-check", Box::new(cluster_size.clone()));
        registry.register("fleet-cluster-size-metric", Box::new(cluster_size));
        registry.register(
            "fleet-balance-check",
            Box::new(BalanceCheck::new(gateway.clone(), balancer)),
        );
        registry.register(
            "fleet-consistency-check",
            Box::new(ConsistencyCheck::new(consistency)),
        );
        registry.register(
            "fleet-machines-metrics",
            Box::new(MachinesMetric::new(gateway.clone(), &config.namespace)),
        );
        registry.register(
            "fleet-units-metrics",
            Box::new(UnitsMetric::new(gateway, &config.namespace)),
        );
        Ok(registry)
    }

    /// Register a check, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, check: Box<dyn Check>) {
        self.checks.insert(name.into(), check);
    }

    pub fn names(&self) -> Vec<&str> {
        self.checks.keys().map(String::as_str).collect()
    }

    pub async fn run(&self, name: &str) -> CheckOutcome<CheckResult> {
        let check = self
            .checks
            .get(name)
            .ok_or_else(|| CheckError::UnknownCheck(name.to_string()))?;

        let result = check.run().await.with_name(name);
        info!(check = %name, status = %result.status, "check finished");
        Ok(result)
    }

    /// Run every registered check in name order.
    pub async fn run_all(&self) -> Vec<CheckResult> {
        let mut results = Vec::with_capacity(self.checks.len());
        for (name, check) in &self.checks {
            let result = check.run().await.with_name(name.as_str());
            info!(check = %name, status = %result.status, "check finished");
            results.push(result);
        }
        results
    }
}
