//! In-memory snapshot of machines and their units.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use fleetcheck_registry::{Machine, RegistryGateway, RegistryResult, Unit};

/// Role → machines carrying that role. The empty role is its own group.
pub type MachinesByRole = BTreeMap<String, Vec<Machine>>;

/// Machine ID → units scheduled there, in registry order.
pub type UnitsByMachine = HashMap<String, Vec<Unit>>;

/// A single consistent read of cluster membership and placement.
///
/// Built fresh for every check and dropped afterwards.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub machines_by_role: MachinesByRole,
    pub units_by_machine: UnitsByMachine,
}

impl Inventory {
    /// Read machines and units once each and group them.
    ///
    /// Either listing failing aborts the build; no partial inventory is
    /// returned.
    pub async fn build(gateway: &dyn RegistryGateway) -> RegistryResult<Self> {
        let machines = gateway.list_machines().await?;
        let units = gateway.list_units().await?;
        let inventory = Self::from_parts(machines, units);
        debug!(
            roles = inventory.machines_by_role.len(),
            machines = inventory.machine_count(),
            "inventory built"
        );
        Ok(inventory)
    }

    pub fn from_parts(machines: Vec<Machine>, units: Vec<Unit>) -> Self {
        let mut machines_by_role = MachinesByRole::new();
        for machine in machines {
            machines_by_role
                .entry(machine.role.clone())
                .or_default()
                .push(machine);
        }

        let mut units_by_machine = UnitsByMachine::new();
        for unit in units {
            // Unscheduled units have no machine to count against.
            if unit.machine_id.is_empty() {
                continue;
            }
            units_by_machine
                .entry(unit.machine_id.clone())
                .or_default()
                .push(unit);
        }

        Self {
            machines_by_role,
            units_by_machine,
        }
    }

    pub fn machines(&self) -> impl Iterator<Item = &Machine> {
        self.machines_by_role.values().flatten()
    }

    pub fn machine_count(&self) -> usize {
        self.machines_by_role.values().map(Vec::len).sum()
    }

    /// Number of units assigned to `machine_id`.
    pub fn load(&self, machine_id: &str) -> usize {
        self.units_by_machine.get(machine_id).map_or(0, Vec::len)
    }
}
