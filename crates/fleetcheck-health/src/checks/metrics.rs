//! Machine and unit count metrics.
//!
//! Metric checks always report `Ok`. A failed listing yields an empty
//! metric; a failed per-machine lookup only drops that machine's
//! breakdown.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{error, warn};

use fleetcheck_core::{CheckResult, Metric, Point};
use fleetcheck_registry::{BoxFuture, Machine, RegistryGateway, machine_key};

use super::Check;

/// Machine counts: `machines.all.all`, `machines.{role}.all`, and
/// `machines.{role|all}.{version}`.
pub struct MachinesMetric {
    gateway: Arc<dyn RegistryGateway>,
    namespace: String,
}

impl MachinesMetric {
    pub fn new(gateway: Arc<dyn RegistryGateway>, namespace: &str) -> Self {
        Self {
            gateway,
            namespace: namespace.to_string(),
        }
    }

    /// Fill `metadata_version` from `/{namespace}/{id}/version`. A failed
    /// lookup leaves the field empty.
    pub async fn resolve_versions(&self, machines: &mut [Machine]) {
        for machine in machines.iter_mut() {
            let key = machine_key(&self.namespace, &machine.id, "version");
            match self.gateway.get(&key).await {
                Ok(version) => machine.metadata_version = version.trim().to_string(),
                Err(e) => warn!(machine = %machine.id, error = %e, "cannot read machine version"),
            }
        }
    }

    async fn collect(&self) -> Metric {
        let mut metric = Metric::new();
        let mut machines = match self.gateway.list_machines().await {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "cannot list machines for metrics");
                return metric;
            }
        };
        self.resolve_versions(&mut machines).await;

        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for machine in &machines {
            *counts.entry("machines.all.all".to_string()).or_default() += 1;

            let mut roles = vec!["all"];
            if !machine.role.is_empty() {
                *counts
                    .entry(format!("machines.{}.all", machine.role))
                    .or_default() += 1;
                roles.push(&machine.role);
            }

            if machine.metadata_version.is_empty() {
                continue;
            }
            let version = metric_segment(&machine.metadata_version);
            for role in roles {
                *counts
                    .entry(format!("machines.{role}.{version}"))
                    .or_default() += 1;
            }
        }

        for (name, count) in counts {
            metric.add_point(Point::new(name, f64::from(count)));
        }
        metric
    }
}

impl Check for MachinesMetric {
    fn run(&self) -> BoxFuture<'_, CheckResult> {
        Box::pin(async move { self.collect().await.render() })
    }
}

/// Unit counts: `units.global.total`, `units.global.{sub_state}`,
/// `units.{hostname}.{sub_state}`, and `units.{hostname}.total`.
pub struct UnitsMetric {
    gateway: Arc<dyn RegistryGateway>,
    namespace: String,
}

impl UnitsMetric {
    pub fn new(gateway: Arc<dyn RegistryGateway>, namespace: &str) -> Self {
        Self {
            gateway,
            namespace: namespace.to_string(),
        }
    }

    async fn collect(&self) -> Metric {
        let mut metric = Metric::new();
        let states = match self.gateway.list_unit_states().await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "cannot list unit states for metrics");
                return metric;
            }
        };

        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        // Hostname per machine; `None` once a lookup has failed.
        let mut hostnames: HashMap<String, Option<String>> = HashMap::new();

        for state in &states {
            let sub = metric_segment(&state.systemd_sub_state);
            *counts.entry("units.global.total".to_string()).or_default() += 1;
            *counts.entry(format!("units.global.{sub}")).or_default() += 1;

            if !hostnames.contains_key(&state.machine_id) {
                let key = machine_key(&self.namespace, &state.machine_id, "hostname");
                let resolved = match self.gateway.get(&key).await {
                    Ok(h) => Some(metric_segment(&h)),
                    Err(e) => {
                        warn!(machine = %state.machine_id, error = %e, "cannot resolve machine hostname");
                        None
                    }
                };
                hostnames.insert(state.machine_id.clone(), resolved);
            }

            if let Some(Some(host)) = hostnames.get(&state.machine_id) {
                *counts.entry(format!("units.{host}.{sub}")).or_default() += 1;
                *counts.entry(format!("units.{host}.total")).or_default() += 1;
            }
        }

        for (name, count) in counts {
            metric.add_point(Point::new(name, f64::from(count)));
        }
        metric
    }
}

impl Check for UnitsMetric {
    fn run(&self) -> BoxFuture<'_, CheckResult> {
        Box::pin(async move { self.collect().await.render() })
    }
}

/// Dots separate metric path levels, so they cannot appear inside one.
fn metric_segment(raw: &str) -> String {
    raw.trim().replace('.', "_")
}
