//! Role-grouped overload detection and migration candidate selection.

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, info};

use fleetcheck_core::{ConfigError, FleetCheckConfig};
use fleetcheck_registry::RegistryGateway;

use crate::error::BalanceResult;
use crate::inventory::{Inventory, MachinesByRole, UnitsByMachine};

/// A machine carrying more than its fair share of units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadRecord {
    pub machine_id: String,
    /// How many units should leave this machine. Always >= 1.
    pub delta_units: u32,
}

/// Outcome of one balancing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebalancePlan {
    /// Overloaded machines, ordered by machine ID.
    pub overloaded: Vec<OverloadRecord>,
    /// Units recommended for migration. Empty when balanced.
    pub candidates: Vec<String>,
}

impl RebalancePlan {
    pub fn is_balanced(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Find overloaded machines in every role group.
///
/// Records are sorted by machine ID so candidate selection, which depends
/// on visiting order, is reproducible.
pub fn find_overloaded(
    machines_by_role: &MachinesByRole,
    units_by_machine: &UnitsByMachine,
    overload_coef: f64,
) -> Vec<OverloadRecord> {
    let load = |id: &str| units_by_machine.get(id).map_or(0, Vec::len);
    let mut overloaded = Vec::new();

    for (role, machines) in machines_by_role {
        if machines.is_empty() {
            continue;
        }

        let total_jobs: usize = machines.iter().map(|m| load(&m.id)).sum();
        let avg = total_jobs as f64 / machines.len() as f64;

        for machine in machines {
            let delta = (load(&machine.id) as f64 / overload_coef - avg).floor();
            if delta >= 1.0 {
                debug!(
                    %role,
                    machine = %machine.id,
                    units = load(&machine.id),
                    avg,
                    delta,
                    "machine overloaded"
                );
                overloaded.push(OverloadRecord {
                    machine_id: machine.id.clone(),
                    delta_units: delta as u32,
                });
            }
        }
    }

    overloaded.sort_by(|a, b| a.machine_id.cmp(&b.machine_id));
    overloaded.dedup_by(|a, b| a.machine_id == b.machine_id);
    overloaded
}

/// Pick up to `delta_units` units from each overloaded machine.
///
/// Units matching `blacklist` are never picked, and no two picks in the
/// pass share a template, even across machines.
pub fn select_candidates(
    overloaded: &[OverloadRecord],
    units_by_machine: &UnitsByMachine,
    blacklist: &Regex,
) -> Vec<String> {
    let mut picked = Vec::new();
    let mut picked_templates: HashSet<&str> = HashSet::new();

    for record in overloaded {
        let Some(units) = units_by_machine.get(&record.machine_id) else {
            continue;
        };

        let mut taken = 0;
        for unit in units {
            if taken >= record.delta_units {
                break;
            }
            if blacklist.is_match(&unit.name) {
                debug!(unit = %unit.name, "skipping blacklisted unit");
                continue;
            }
            if !picked_templates.insert(unit.template()) {
                continue;
            }
            picked.push(unit.name.clone());
            taken += 1;
        }

        if taken < record.delta_units {
            debug!(
                machine = %record.machine_id,
                wanted = record.delta_units,
                taken,
                "not enough movable units on overloaded machine"
            );
        }
    }

    picked
}

/// Full balancing pass over already-fetched data.
pub fn select_rebalance_candidates(
    machines_by_role: &MachinesByRole,
    units_by_machine: &UnitsByMachine,
    blacklist: &Regex,
    overload_coef: f64,
) -> Vec<String> {
    let overloaded = find_overloaded(machines_by_role, units_by_machine, overload_coef);
    select_candidates(&overloaded, units_by_machine, blacklist)
}

/// Balancer configured with a blacklist and an overload coefficient.
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    blacklist: Regex,
    overload_coef: f64,
}

impl LoadBalancer {
    /// Rejects a coefficient below 1 or not finite.
    pub fn new(blacklist: Regex, overload_coef: f64) -> BalanceResult<Self> {
        if !overload_coef.is_finite() || overload_coef < 1.0 {
            return Err(ConfigError::InvalidOverloadCoef(overload_coef).into());
        }
        Ok(Self {
            blacklist,
            overload_coef,
        })
    }

    /// Balancer using the configured balance blacklist and coefficient.
    pub fn from_config(config: &FleetCheckConfig) -> BalanceResult<Self> {
        Self::new(config.balance_blacklist()?, config.overload_coef)
    }

    /// Overloaded machines and migration candidates for an already-built
    /// inventory.
    pub fn plan(&self, inventory: &Inventory) -> RebalancePlan {
        let overloaded = find_overloaded(
            &inventory.machines_by_role,
            &inventory.units_by_machine,
            self.overload_coef,
        );
        let candidates = select_candidates(&overloaded, &inventory.units_by_machine, &self.blacklist);
        RebalancePlan {
            overloaded,
            candidates,
        }
    }

    /// Build a fresh inventory and plan over it.
    pub async fn run(&self, gateway: &dyn RegistryGateway) -> BalanceResult<RebalancePlan> {
        let inventory = Inventory::build(gateway).await?;
        let plan = self.plan(&inventory);
        info!(
            overloaded = plan.overloaded.len(),
            candidates = plan.candidates.len(),
            "balancing pass complete"
        );
        Ok(plan)
    }
}
