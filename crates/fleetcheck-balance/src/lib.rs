//! fleetcheck-balance — detect workload imbalance and pick units to move.
//!
//! Reads a fresh inventory from the registry on every pass and recommends
//! migration candidates. It never moves anything itself.
//!
//! # Architecture
//!
//! ```text
//! RegistryGateway
//!   └── Inventory::build()          one machines read, one units read
//!       ├── machines_by_role        role → [Machine]
//!       └── units_by_machine        machine_id → [Unit]
//!           └── LoadBalancer
//!               ├── find_overloaded()        per-role average, coefficient discount
//!               └── select_candidates()      blacklist + cross-machine template dedup
//! ```
//!
//! # Overload rule
//!
//! For a role group with average load `avg`, a machine holding `n` units is
//! overloaded by `floor(n / coef - avg)` units when that value is at least
//! one. The coefficient keeps a single extra unit from triggering moves.

pub mod error;
pub mod inventory;
pub mod load_balancer;

pub use error::{BalanceError, BalanceResult};
pub use inventory::{Inventory, MachinesByRole, UnitsByMachine};
pub use load_balancer::{
    LoadBalancer, OverloadRecord, RebalancePlan, find_overloaded, select_rebalance_candidates,
};
