//! The read-only registry interface consumed by every check.

use std::future::Future;
use std::pin::Pin;

use crate::error::RegistryResult;
use crate::types::{Machine, Unit, UnitState};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read-only view over the scheduler and the key space.
///
/// Object-safe so that checks can share an `Arc<dyn RegistryGateway>`
/// across spawned tasks.
pub trait RegistryGateway: Send + Sync {
    /// Machines currently active in the scheduler.
    fn list_machines(&self) -> BoxFuture<'_, RegistryResult<Vec<Machine>>>;

    /// Units known to the scheduler, in registry order.
    fn list_units(&self) -> BoxFuture<'_, RegistryResult<Vec<Unit>>>;

    /// systemd states of scheduled units.
    fn list_unit_states(&self) -> BoxFuture<'_, RegistryResult<Vec<UnitState>>>;

    /// Value stored at `key`. A missing key is `RegistryError::NotFound`.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, RegistryResult<String>>;

    /// Full keys of the direct children of `dir`.
    fn list_keys<'a>(&'a self, dir: &'a str) -> BoxFuture<'a, RegistryResult<Vec<String>>>;
}

/// Key of a per-machine record: `/{namespace}/{machine_id}/{leaf}`.
pub fn machine_key(namespace: &str, machine_id: &str, leaf: &str) -> String {
    format!("/{}/{}/{}", namespace.trim_matches('/'), machine_id, leaf)
}
