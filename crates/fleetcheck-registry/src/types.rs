//! Domain types for cluster membership and workload placement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque machine identifier assigned by the scheduler.
pub type MachineId = String;

// ── Machine ───────────────────────────────────────────────────────

/// A machine as reported by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Machine {
    pub id: MachineId,
    /// `metadata["role"]`; empty when the machine carries no role.
    pub role: String,
    pub ip: String,
    /// Read from `/{namespace}/{id}/version` by the checks that need it;
    /// empty until then or when the record is missing.
    #[serde(default)]
    pub metadata_version: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Machine {
    pub fn new(id: impl Into<String>, ip: impl Into<String>, metadata: BTreeMap<String, String>) -> Self {
        let role = metadata.get("role").cloned().unwrap_or_default();
        Self {
            id: id.into(),
            role,
            ip: ip.into(),
            metadata_version: String::new(),
            metadata,
        }
    }

    /// Convenience constructor for a machine with only a role.
    pub fn with_role(id: impl Into<String>, role: &str) -> Self {
        let mut metadata = BTreeMap::new();
        if !role.is_empty() {
            metadata.insert("role".to_string(), role.to_string());
        }
        Self::new(id, "", metadata)
    }
}

// ── Unit ──────────────────────────────────────────────────────────

/// Scheduler-level state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    #[default]
    Inactive,
    Loaded,
    Launched,
}

/// One `[Section] Name=Value` line of a unit file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitOption {
    pub section: String,
    pub name: String,
    pub value: String,
}

/// A schedulable workload definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    /// Empty when the unit is not scheduled anywhere.
    pub machine_id: MachineId,
    pub desired_state: UnitStatus,
    pub current_state: UnitStatus,
    #[serde(default)]
    pub options: Vec<UnitOption>,
}

impl Unit {
    pub fn new(name: impl Into<String>, machine_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            machine_id: machine_id.into(),
            desired_state: UnitStatus::Launched,
            current_state: UnitStatus::Launched,
            options: Vec::new(),
        }
    }

    /// The workload class this unit belongs to.
    pub fn template(&self) -> &str {
        template_of(&self.name)
    }

    /// Global units run on every machine and have no single placement.
    pub fn is_global(&self) -> bool {
        self.options.iter().any(|o| {
            o.section == "X-Fleet" && o.name == "Global" && o.value.eq_ignore_ascii_case("true")
        })
    }
}

/// Portion of a unit name before the `@` instance separator, or the whole
/// name when there is none.
pub fn template_of(name: &str) -> &str {
    match name.split_once('@') {
        Some((template, _)) => template,
        None => name,
    }
}

/// systemd-level state of a unit on the machine running it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitState {
    pub name: String,
    pub machine_id: MachineId,
    pub systemd_load_state: String,
    pub systemd_active_state: String,
    pub systemd_sub_state: String,
}

impl UnitState {
    /// Whether systemd reports the unit as stopped or crashed.
    pub fn is_failed(&self) -> bool {
        matches!(self.systemd_active_state.as_str(), "failed" | "inactive")
            || matches!(self.systemd_sub_state.as_str(), "dead" | "failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_strips_instance_suffix() {
        assert_eq!(template_of("api@1.service"), "api");
        assert_eq!(template_of("api@2.service"), "api");
        assert_eq!(template_of("worker.service"), "worker.service");
        assert_eq!(template_of("@odd"), "");
    }

    #[test]
    fn role_comes_from_metadata() {
        let mut metadata = BTreeMap::new();
        metadata.insert("role".to_string(), "web".to_string());
        let m = Machine::new("m1", "10.0.0.1", metadata);
        assert_eq!(m.role, "web");

        let m = Machine::new("m2", "10.0.0.2", BTreeMap::new());
        assert_eq!(m.role, "");
    }

    #[test]
    fn global_unit_detection() {
        let mut unit = Unit::new("logger.service", "");
        assert!(!unit.is_global());

        unit.options.push(UnitOption {
            section: "X-Fleet".to_string(),
            name: "Global".to_string(),
            value: "true".to_string(),
        });
        assert!(unit.is_global());
    }

    #[test]
    fn failed_unit_states() {
        let state = |active: &str, sub: &str| UnitState {
            name: "a.service".to_string(),
            machine_id: "m1".to_string(),
            systemd_load_state: "loaded".to_string(),
            systemd_active_state: active.to_string(),
            systemd_sub_state: sub.to_string(),
        };

        assert!(!state("active", "running").is_failed());
        assert!(state("failed", "failed").is_failed());
        assert!(state("inactive", "dead").is_failed());
        assert!(state("active", "dead").is_failed());
        assert!(!state("activating", "start").is_failed());
    }
}
