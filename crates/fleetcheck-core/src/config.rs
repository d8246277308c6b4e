//! fleetcheck configuration.
//!
//! Values come from three layers, lowest priority first: built-in
//! defaults, an optional TOML file, and environment variables.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::threshold::{Comparison, Threshold};

pub const DEFAULT_FLEET_URL: &str = "unix:///var/run/fleet.sock";
pub const DEFAULT_ETCD_URL: &str = "http://172.17.42.1:2379";
pub const DEFAULT_NAMESPACE: &str = "machines";
pub const DEFAULT_UNIT_STATES_BLACKLIST: &str = r".*-backup\.service";
pub const DEFAULT_BALANCE_BLACKLIST: &str =
    r"^(rabbitmq|elasticsearch|fleet-balancer)([@.-].*)?\.service$|.*-backup\.service";
pub const DEFAULT_OVERLOAD_COEF: f64 = 1.3;
pub const DEFAULT_CLUSTER_SIZE_WARNING: f64 = 7.0;
pub const DEFAULT_CLUSTER_SIZE_ERROR: f64 = 6.0;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Source of environment-style overrides.
///
/// The process environment in production, a plain map in tests.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads overrides from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FleetCheckConfig {
    /// Scheduler API endpoint, `http://host:port` or `unix:///path`.
    pub fleet_url: String,
    /// Key-value registry endpoint.
    pub etcd_url: String,
    /// Key-space directory holding per-machine records.
    pub namespace: String,
    /// Units excluded from the unit-states check.
    pub unit_states_blacklist: String,
    /// Units never proposed for migration.
    pub balance_blacklist: String,
    /// Discount applied to a machine's own load before comparing it to
    /// the role average.
    pub overload_coef: f64,
    pub cluster_size: ClusterSizeConfig,
    /// Per-request timeout for registry calls, in milliseconds.
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterSizeConfig {
    pub warning: f64,
    pub error: f64,
}

impl Default for FleetCheckConfig {
    fn default() -> Self {
        Self {
            fleet_url: DEFAULT_FLEET_URL.to_string(),
            etcd_url: DEFAULT_ETCD_URL.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            unit_states_blacklist: DEFAULT_UNIT_STATES_BLACKLIST.to_string(),
            balance_blacklist: DEFAULT_BALANCE_BLACKLIST.to_string(),
            overload_coef: DEFAULT_OVERLOAD_COEF,
            cluster_size: ClusterSizeConfig::default(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl Default for ClusterSizeConfig {
    fn default() -> Self {
        Self {
            warning: DEFAULT_CLUSTER_SIZE_WARNING,
            error: DEFAULT_CLUSTER_SIZE_ERROR,
        }
    }
}

impl FleetCheckConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load the full configuration: defaults, then `path` if given, then
    /// environment overrides. The result is validated.
    pub fn load(path: Option<&Path>, env: &impl EnvSource) -> ConfigResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        debug!(
            fleet_url = %config.fleet_url,
            etcd_url = %config.etcd_url,
            namespace = %config.namespace,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Overlay environment variables onto this configuration.
    ///
    /// Empty variables are treated as unset. Numeric variables that fail
    /// to parse are an error.
    pub fn apply_env(&mut self, env: &impl EnvSource) -> ConfigResult<()> {
        let get = |key: &str| env.var(key).filter(|v| !v.is_empty());

        if let Some(v) = get("FLEET_URL") {
            self.fleet_url = v;
        }
        if let Some(v) = get("ETCD_URL") {
            self.etcd_url = v;
        }
        if let Some(v) = get("ETCD_NAMESPACE") {
            self.namespace = v;
        }
        if let Some(v) = get("BLACKLIST_REGEXP") {
            self.unit_states_blacklist = v;
        }
        if let Some(v) = get("BALANCE_BLACKLIST_REGEXP") {
            self.balance_blacklist = v;
        }
        if let Some(v) = get("OVERLOAD_COEF") {
            self.overload_coef = parse_value("OVERLOAD_COEF", &v)?;
        }
        if let Some(v) = get("FLEET_CLUSTER_SIZE_WARNING_THRESHOLD") {
            self.cluster_size.warning = parse_value("FLEET_CLUSTER_SIZE_WARNING_THRESHOLD", &v)?;
        }
        if let Some(v) = get("FLEET_CLUSTER_SIZE_ERROR_THRESHOLD") {
            self.cluster_size.error = parse_value("FLEET_CLUSTER_SIZE_ERROR_THRESHOLD", &v)?;
        }
        if let Some(v) = get("REGISTRY_TIMEOUT_MS") {
            self.request_timeout_ms = parse_value("REGISTRY_TIMEOUT_MS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.overload_coef.is_finite() || self.overload_coef < 1.0 {
            return Err(ConfigError::InvalidOverloadCoef(self.overload_coef));
        }
        if !self.cluster_size.warning.is_finite() {
            return Err(ConfigError::InvalidThreshold("cluster_size.warning"));
        }
        if !self.cluster_size.error.is_finite() {
            return Err(ConfigError::InvalidThreshold("cluster_size.error"));
        }
        self.unit_states_blacklist()?;
        self.balance_blacklist()?;
        Ok(())
    }

    pub fn unit_states_blacklist(&self) -> ConfigResult<Regex> {
        compile_pattern(&self.unit_states_blacklist)
    }

    pub fn balance_blacklist(&self) -> ConfigResult<Regex> {
        compile_pattern(&self.balance_blacklist)
    }

    /// Cluster-size gate: too few machines is the failure direction.
    pub fn cluster_size_threshold(&self) -> Threshold {
        Threshold::new(
            self.cluster_size.warning,
            self.cluster_size.error,
            Comparison::Below,
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn compile_pattern(pattern: &str) -> ConfigResult<Regex> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        let config = FleetCheckConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.namespace, "machines");
        assert_eq!(config.overload_coef, 1.3);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn default_balance_blacklist_protects_infrastructure() {
        let re = FleetCheckConfig::default().balance_blacklist().unwrap();
        assert!(re.is_match("rabbitmq.service"));
        assert!(re.is_match("rabbitmq@1.service"));
        assert!(re.is_match("elasticsearch@2.service"));
        assert!(re.is_match("fleet-balancer.service"));
        assert!(re.is_match("postgres-backup.service"));
        assert!(!re.is_match("api@1.service"));
        assert!(!re.is_match("worker.service"));
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = FleetCheckConfig::default();
        config
            .apply_env(&env(&[
                ("FLEET_URL", "http://10.0.0.1:49153"),
                ("ETCD_NAMESPACE", "hosts"),
                ("OVERLOAD_COEF", "1.5"),
                ("FLEET_CLUSTER_SIZE_ERROR_THRESHOLD", "3"),
                ("REGISTRY_TIMEOUT_MS", "250"),
            ]))
            .unwrap();

        assert_eq!(config.fleet_url, "http://10.0.0.1:49153");
        assert_eq!(config.namespace, "hosts");
        assert_eq!(config.overload_coef, 1.5);
        assert_eq!(config.cluster_size.error, 3.0);
        assert_eq!(config.cluster_size.warning, 7.0);
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = FleetCheckConfig::default();
        config.apply_env(&env(&[("ETCD_NAMESPACE", "")])).unwrap();
        assert_eq!(config.namespace, "machines");
    }

    #[test]
    fn malformed_numeric_env_is_rejected() {
        let mut config = FleetCheckConfig::default();
        let err = config
            .apply_env(&env(&[("OVERLOAD_COEF", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn coefficient_below_one_is_rejected() {
        let config = FleetCheckConfig {
            overload_coef: 0.9,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOverloadCoef(_))
        ));
    }

    #[test]
    fn invalid_blacklist_is_rejected() {
        let config = FleetCheckConfig {
            balance_blacklist: "(unclosed".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn nan_threshold_is_rejected() {
        let mut config = FleetCheckConfig::default();
        config.cluster_size.warning = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold("cluster_size.warning"))
        ));
    }

    #[test]
    fn load_from_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
etcd_url = "http://etcd:2379"
overload_coef = 2.0

[cluster_size]
warning = 5
"#
        )
        .unwrap();

        let config =
            FleetCheckConfig::load(Some(file.path()), &env(&[("OVERLOAD_COEF", "1.1")])).unwrap();

        assert_eq!(config.etcd_url, "http://etcd:2379");
        assert_eq!(config.overload_coef, 1.1);
        assert_eq!(config.cluster_size.warning, 5.0);
        assert_eq!(config.cluster_size.error, 6.0);
        assert_eq!(config.fleet_url, DEFAULT_FLEET_URL);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = FleetCheckConfig::load(
            Some(Path::new("/nonexistent/fleetcheck.toml")),
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn cluster_size_threshold_points_down() {
        let threshold = FleetCheckConfig::default().cluster_size_threshold();
        assert_eq!(threshold.comparison, Comparison::Below);
        assert_eq!(threshold.warning, 7.0);
        assert_eq!(threshold.error, 6.0);
    }
}
