//! Unit placement and systemd state checks.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use fleetcheck_core::CheckResult;
use fleetcheck_registry::{BoxFuture, RegistryGateway};

use super::{Check, failed};
use crate::error::CheckOutcome;

/// Warns about non-global units whose current state differs from the
/// desired one.
pub struct UnitsCheck {
    gateway: Arc<dyn RegistryGateway>,
}

impl UnitsCheck {
    pub fn new(gateway: Arc<dyn RegistryGateway>) -> Self {
        Self { gateway }
    }

    async fn evaluate(&self) -> CheckOutcome<CheckResult> {
        let units = self.gateway.list_units().await?;

        let drifted: Vec<&str> = units
            .iter()
            .filter(|u| u.desired_state != u.current_state && !u.is_global())
            .map(|u| u.name.as_str())
            .collect();

        debug!(units = units.len(), drifted = drifted.len(), "unit states compared");

        if drifted.is_empty() {
            Ok(CheckResult::ok("Every unit is in its desired state"))
        } else {
            Ok(CheckResult::warning(format!(
                "Units in an incoherent state: {}",
                drifted.join(",")
            )))
        }
    }
}

impl Check for UnitsCheck {
    fn run(&self) -> BoxFuture<'_, CheckResult> {
        Box::pin(async move { self.evaluate().await.unwrap_or_else(failed) })
    }
}

/// Warns about units that systemd reports as failed or dead.
pub struct UnitStatesCheck {
    gateway: Arc<dyn RegistryGateway>,
    blacklist: Regex,
}

impl UnitStatesCheck {
    pub fn new(gateway: Arc<dyn RegistryGateway>, blacklist: Regex) -> Self {
        Self { gateway, blacklist }
    }

    async fn evaluate(&self) -> CheckOutcome<CheckResult> {
        let states = self.gateway.list_unit_states().await?;

        let failing: Vec<&str> = states
            .iter()
            .filter(|s| !self.blacklist.is_match(&s.name))
            .filter(|s| s.is_failed())
            .map(|s| s.name.as_str())
            .collect();

        if failing.is_empty() {
            Ok(CheckResult::ok("Every unit is up and running"))
        } else {
            Ok(CheckResult::warning(format!(
                "Failed units: {}",
                failing.join(",")
            )))
        }
    }
}

impl Check for UnitStatesCheck {
    fn run(&self) -> BoxFuture<'_, CheckResult> {
        Box::pin(async move { self.evaluate().await.unwrap_or_else(failed) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcheck_core::Level;
    use fleetcheck_registry::{StaticRegistry, Unit, UnitOption, UnitState, UnitStatus};

    fn unit(name: &str, desired: UnitStatus, current: UnitStatus) -> Unit {
        Unit {
            desired_state: desired,
            current_state: current,
            ..Unit::new(name, "m1")
        }
    }

    fn state(name: &str, active: &str, sub: &str) -> UnitState {
        UnitState {
            name: name.to_string(),
            machine_id: "m1".to_string(),
            systemd_load_state: "loaded".to_string(),
            systemd_active_state: active.to_string(),
            systemd_sub_state: sub.to_string(),
        }
    }

    #[tokio::test]
    async fn units_in_desired_state_are_ok() {
        let reg = StaticRegistry::new().with_units(vec![
            unit("a.service", UnitStatus::Launched, UnitStatus::Launched),
            unit("b.service", UnitStatus::Loaded, UnitStatus::Loaded),
        ]);
        let result = UnitsCheck::new(Arc::new(reg)).run().await;
        assert_eq!(result.status, Level::Ok);
    }

    #[tokio::test]
    async fn drifted_units_warn_but_global_units_are_ignored() {
        let mut global = unit("logger.service", UnitStatus::Launched, UnitStatus::Inactive);
        global.options.push(UnitOption {
            section: "X-Fleet".to_string(),
            name: "Global".to_string(),
            value: "true".to_string(),
        });

        let reg = StaticRegistry::new().with_units(vec![
            unit("a.service", UnitStatus::Launched, UnitStatus::Inactive),
            global,
            unit("b.service", UnitStatus::Launched, UnitStatus::Loaded),
        ]);
        let result = UnitsCheck::new(Arc::new(reg)).run().await;

        assert_eq!(result.status, Level::Warning);
        assert_eq!(result.output, "Units in an incoherent state: a.service,b.service");
    }

    #[tokio::test]
    async fn units_listing_failure_is_an_error() {
        let reg = StaticRegistry::new().failing_listing("units");
        let result = UnitsCheck::new(Arc::new(reg)).run().await;
        assert_eq!(result.status, Level::Error);
        assert!(result.output.contains("units listing failed"));
    }

    #[tokio::test]
    async fn failed_units_warn_unless_blacklisted() {
        let reg = StaticRegistry::new().with_unit_states(vec![
            state("api@1.service", "active", "running"),
            state("api@2.service", "failed", "failed"),
            state("db-backup.service", "inactive", "dead"),
            state("worker.service", "active", "dead"),
        ]);
        let blacklist = Regex::new(r".*-backup\.service").unwrap();
        let result = UnitStatesCheck::new(Arc::new(reg), blacklist).run().await;

        assert_eq!(result.status, Level::Warning);
        assert_eq!(result.output, "Failed units: api@2.service,worker.service");
    }

    #[tokio::test]
    async fn healthy_units_are_ok() {
        let reg = StaticRegistry::new()
            .with_unit_states(vec![state("api@1.service", "active", "running")]);
        let blacklist = Regex::new("^$").unwrap();
        let result = UnitStatesCheck::new(Arc::new(reg), blacklist).run().await;
        assert_eq!(result.status, Level::Ok);
    }
}
