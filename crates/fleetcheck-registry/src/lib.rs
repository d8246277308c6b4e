//! fleetcheck-registry — read-only access to cluster membership and
//! workload placement.
//!
//! Two stores back the gateway: the fleet scheduler API (machines, units,
//! unit states) and the etcd v2 key space (per-machine records such as
//! hostname and version).
//!
//! # Architecture
//!
//! ```text
//! RegistryGateway (trait, object-safe)
//!   ├── HttpRegistry   — fleet over TCP or a unix socket, etcd over TCP
//!   └── StaticRegistry — in-memory fixture with failure injection
//! ```

pub mod error;
pub mod gateway;
pub mod client;
pub mod memory;
pub mod types;

pub use error::{RegistryError, RegistryResult};
pub use gateway::{BoxFuture, RegistryGateway, machine_key};
pub use client::{Endpoint, HttpRegistry};
pub use memory::StaticRegistry;
pub use types::*;
