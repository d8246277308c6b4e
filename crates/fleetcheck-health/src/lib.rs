//! fleetcheck-health — the checks run against a fleet cluster.
//!
//! Every check reads a fresh view of the registry, derives a verdict, and
//! returns a `CheckResult`. Nothing is cached between invocations.
//!
//! # Architecture
//!
//! ```text
//! CheckRegistry (built once at startup)
//!   ├── fleet-units-checks         desired vs current state
//!   ├── fleet-unit-states-checks   failed systemd units
//!   ├── fleet-cluster-size-check   Threshold over the machine count
//!   ├── fleet-cluster-size-metric  same gate, registered for metric runs
//!   ├── fleet-balance-check        Inventory + LoadBalancer
//!   ├── fleet-consistency-check    ConsistencyChecker
//!   ├── fleet-machines-metrics     machine counts per role and version
//!   └── fleet-units-metrics        unit counts per host and sub-state
//! ```
//!
//! # Consistency
//!
//! The consistency check compares the scheduler's active machines with
//! the machine records persisted in the key space. Machines that have a
//! record but are not active are resolved to hostnames concurrently, one
//! task per machine, each under its own timeout.

pub mod checks;
pub mod consistency;
pub mod error;
pub mod registry;

pub use checks::Check;
pub use consistency::{ConsistencyChecker, ConsistencyReport, missing_machine_ids};
pub use error::{CheckError, CheckOutcome};
pub use registry::CheckRegistry;
