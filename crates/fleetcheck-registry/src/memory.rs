//! In-memory registry gateway.
//!
//! Serves fixed machines, units, unit states, and keys. Listing failures,
//! per-key failures, and per-key delays can be injected, and every listing
//! call is counted so callers can assert how many reads they made.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{RegistryError, RegistryResult};
use crate::gateway::{BoxFuture, RegistryGateway};
use crate::types::{Machine, Unit, UnitState};

#[derive(Debug, Default)]
pub struct StaticRegistry {
    machines: Vec<Machine>,
    units: Vec<Unit>,
    unit_states: Vec<UnitState>,
    keys: BTreeMap<String, String>,
    /// Listing calls that fail: "machines", "units", "unit_states".
    failing_listings: HashSet<&'static str>,
    failing_keys: HashSet<String>,
    slow_keys: HashMap<String, Duration>,
    machine_calls: AtomicUsize,
    unit_calls: AtomicUsize,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_machines(mut self, machines: Vec<Machine>) -> Self {
        self.machines = machines;
        self
    }

    pub fn with_units(mut self, units: Vec<Unit>) -> Self {
        self.units = units;
        self
    }

    pub fn with_unit_states(mut self, states: Vec<UnitState>) -> Self {
        self.unit_states = states;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(key.into(), value.into());
        self
    }

    /// Make `listing` ("machines", "units" or "unit_states") fail.
    pub fn failing_listing(mut self, listing: &'static str) -> Self {
        self.failing_listings.insert(listing);
        self
    }

    /// Make lookups of `key` fail with an unavailable error.
    pub fn failing_key(mut self, key: impl Into<String>) -> Self {
        self.failing_keys.insert(key.into());
        self
    }

    /// Delay lookups of `key` by `delay`.
    pub fn slow_key(mut self, key: impl Into<String>, delay: Duration) -> Self {
        self.slow_keys.insert(key.into(), delay);
        self
    }

    pub fn machine_calls(&self) -> usize {
        self.machine_calls.load(Ordering::Relaxed)
    }

    pub fn unit_calls(&self) -> usize {
        self.unit_calls.load(Ordering::Relaxed)
    }

    fn check_listing(&self, listing: &'static str) -> RegistryResult<()> {
        if self.failing_listings.contains(listing) {
            return Err(RegistryError::Unavailable(format!("{listing} listing failed")));
        }
        Ok(())
    }
}

impl RegistryGateway for StaticRegistry {
    fn list_machines(&self) -> BoxFuture<'_, RegistryResult<Vec<Machine>>> {
        Box::pin(async move {
            self.machine_calls.fetch_add(1, Ordering::Relaxed);
            self.check_listing("machines")?;
            Ok(self.machines.clone())
        })
    }

    fn list_units(&self) -> BoxFuture<'_, RegistryResult<Vec<Unit>>> {
        Box::pin(async move {
            self.unit_calls.fetch_add(1, Ordering::Relaxed);
            self.check_listing("units")?;
            Ok(self.units.clone())
        })
    }

    fn list_unit_states(&self) -> BoxFuture<'_, RegistryResult<Vec<UnitState>>> {
        Box::pin(async move {
            self.check_listing("unit_states")?;
            Ok(self.unit_states.clone())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, RegistryResult<String>> {
        Box::pin(async move {
            if let Some(delay) = self.slow_keys.get(key) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing_keys.contains(key) {
                return Err(RegistryError::Unavailable(format!("lookup of {key} failed")));
            }
            self.keys
                .get(key)
                .cloned()
                .ok_or_else(|| RegistryError::NotFound(key.to_string()))
        })
    }

    fn list_keys<'a>(&'a self, dir: &'a str) -> BoxFuture<'a, RegistryResult<Vec<String>>> {
        Box::pin(async move {
            let dir = dir.trim_end_matches('/');
            let prefix = format!("{dir}/");

            let children: BTreeSet<String> = self
                .keys
                .keys()
                .filter_map(|k| k.strip_prefix(&prefix))
                .filter_map(|rest| rest.split('/').next())
                .filter(|child| !child.is_empty())
                .map(|child| format!("{prefix}{child}"))
                .collect();

            if children.is_empty() {
                return Err(RegistryError::NotFound(dir.to_string()));
            }
            Ok(children.into_iter().collect())
        })
    }
}
