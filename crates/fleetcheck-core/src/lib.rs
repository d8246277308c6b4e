//! fleetcheck-core — shared types for the fleet monitoring checks.
//!
//! Holds the pieces every check depends on:
//!
//! - **`config`** — `FleetCheckConfig`, loaded from TOML and overlaid by the
//!   process environment
//! - **`types`** — check results, verdict levels, and metric points
//! - **`threshold`** — tri-state classification of a single observation

pub mod config;
pub mod error;
pub mod threshold;
pub mod types;

pub use config::{ClusterSizeConfig, EnvSource, FleetCheckConfig, ProcessEnv};
pub use error::{ConfigError, ConfigResult};
pub use threshold::{Comparison, Threshold, classify};
pub use types::*;
