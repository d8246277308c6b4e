//! Reconciliation of scheduler membership against the key space.
//!
//! A machine that has a record under `/{namespace}/{id}` but is absent
//! from the scheduler's active list is reported by hostname.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use fleetcheck_registry::{Machine, RegistryGateway, RegistryResult, machine_key};

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub active_machines: usize,
    pub registered_machines: usize,
    /// Hostnames of registered machines missing from the scheduler,
    /// sorted. Machines whose hostname could not be resolved are omitted.
    pub missing_hostnames: Vec<String>,
}

/// IDs under `registry_keys` that are not among `active` machine IDs.
///
/// The trailing path segment of each key is the candidate ID. An ID is
/// missing only when no active machine carries it. Order follows the keys;
/// duplicates are reported once.
pub fn missing_machine_ids(active: &[Machine], registry_keys: &[String]) -> Vec<String> {
    let active_ids: HashSet<&str> = active.iter().map(|m| m.id.as_str()).collect();
    let mut seen = HashSet::new();
    let mut missing = Vec::new();

    for key in registry_keys {
        let Some(id) = key.trim_end_matches('/').rsplit('/').next() else {
            continue;
        };
        if id.is_empty() || active_ids.contains(id) {
            continue;
        }
        if seen.insert(id) {
            missing.push(id.to_string());
        }
    }

    missing
}

/// Compares the scheduler's active machines with the machine records in
/// the key space and names the ones that dropped out.
pub struct ConsistencyChecker {
    gateway: Arc<dyn RegistryGateway>,
    namespace: String,
    lookup_timeout: Duration,
}

impl ConsistencyChecker {
    /// `lookup_timeout` bounds each hostname lookup separately.
    pub fn new(gateway: Arc<dyn RegistryGateway>, namespace: &str, lookup_timeout: Duration) -> Self {
        Self {
            gateway,
            namespace: namespace.trim_matches('/').to_string(),
            lookup_timeout,
        }
    }

    /// Read both membership views and reconcile them.
    ///
    /// Listing failures abort; a namespace with no records is treated as
    /// an empty key list.
    pub async fn run(&self) -> RegistryResult<ConsistencyReport> {
        let active = self.gateway.list_machines().await?;

        let dir = format!("/{}", self.namespace);
        let keys = match self.gateway.list_keys(&dir).await {
            Ok(keys) => keys,
            Err(e) if e.is_not_found() => {
                debug!(%dir, "machine namespace is empty");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let missing_hostnames = self.find_missing_machines(&active, &keys).await;
        Ok(ConsistencyReport {
            active_machines: active.len(),
            registered_machines: keys.len(),
            missing_hostnames,
        })
    }

    /// Hostnames of machines that have a registry record but are not active.
    pub async fn find_missing_machines(
        &self,
        active: &[Machine],
        registry_keys: &[String],
    ) -> Vec<String> {
        let ids = missing_machine_ids(active, registry_keys);
        if ids.is_empty() {
            return Vec::new();
        }
        debug!(count = ids.len(), "resolving hostnames of missing machines");
        self.resolve_hostnames(ids).await
    }

    /// One lookup task per machine, joined before returning. A failed or
    /// timed-out lookup drops that machine from the result.
    async fn resolve_hostnames(&self, ids: Vec<String>) -> Vec<String> {
        let hostnames = Arc::new(Mutex::new(Vec::with_capacity(ids.len())));
        let mut lookups = JoinSet::new();

        for id in ids {
            let gateway = Arc::clone(&self.gateway);
            let hostnames = Arc::clone(&hostnames);
            let key = machine_key(&self.namespace, &id, "hostname");
            let timeout = self.lookup_timeout;

            lookups.spawn(async move {
                match tokio::time::timeout(timeout, gateway.get(&key)).await {
                    Ok(Ok(hostname)) => hostnames.lock().await.push(hostname),
                    Ok(Err(e)) => {
                        warn!(machine = %id, error = %e, "hostname lookup failed, machine left out of report");
                    }
                    Err(_) => {
                        warn!(
                            machine = %id,
                            timeout_ms = timeout.as_millis() as u64,
                            "hostname lookup timed out, machine left out of report"
                        );
                    }
                }
            });
        }

        while let Some(joined) = lookups.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "hostname lookup task failed");
            }
        }

        let mut hostnames = std::mem::take(&mut *hostnames.lock().await);
        hostnames.sort();
        hostnames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcheck_registry::StaticRegistry;

    fn machines(ids: &[&str]) -> Vec<Machine> {
        ids.iter().map(|id| Machine::with_role(*id, "")).collect()
    }

    fn keys(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| format!("/machines/{id}")).collect()
    }

    fn registry() -> StaticRegistry {
        StaticRegistry::new()
            .with_key("/machines/A/hostname", "host-a")
            .with_key("/machines/B/hostname", "host-b")
            .with_key("/machines/C/hostname", "host-c")
            .with_key("/machines/D/hostname", "host-d")
    }

    fn checker(reg: StaticRegistry) -> ConsistencyChecker {
        ConsistencyChecker::new(Arc::new(reg), "machines", Duration::from_secs(1))
    }

    #[test]
    fn missing_ids_use_the_trailing_segment() {
        let missing = missing_machine_ids(
            &machines(&["A", "B"]),
            &["/machines/A".to_string(), "/machines/C/".to_string(), "C".to_string()],
        );
        assert_eq!(missing, vec!["C"]);
    }

    #[test]
    fn machine_present_anywhere_in_active_list_is_not_missing() {
        // The match sits at the end of the active list.
        let missing = missing_machine_ids(&machines(&["X", "Y", "Z", "A"]), &keys(&["A"]));
        assert!(missing.is_empty());
    }

    #[test]
    fn empty_keys_are_skipped() {
        let missing = missing_machine_ids(&machines(&[]), &["/".to_string(), String::new()]);
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn reports_hostname_of_the_missing_machine() {
        let checker = checker(registry());
        let missing = checker
            .find_missing_machines(&machines(&["A", "B"]), &keys(&["A", "B", "C"]))
            .await;
        assert_eq!(missing, vec!["host-c"]);
    }

    #[tokio::test]
    async fn nothing_missing_when_views_agree() {
        let checker = checker(registry());
        let missing = checker
            .find_missing_machines(&machines(&["A", "B"]), &keys(&["A", "B"]))
            .await;
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn failed_lookup_drops_only_that_machine() {
        let reg = registry().failing_key("/machines/C/hostname");
        let checker = checker(reg);
        let missing = checker
            .find_missing_machines(&machines(&["A"]), &keys(&["A", "B", "C", "E"]))
            .await;
        // C fails, E has no hostname record.
        assert_eq!(missing, vec!["host-b"]);
    }

    #[tokio::test]
    async fn slow_lookup_times_out_without_blocking_others() {
        let reg = registry().slow_key("/machines/C/hostname", Duration::from_secs(30));
        let checker = ConsistencyChecker::new(Arc::new(reg), "machines", Duration::from_millis(50));

        let started = std::time::Instant::now();
        let missing = checker
            .find_missing_machines(&machines(&[]), &keys(&["B", "C", "D"]))
            .await;

        assert_eq!(missing, vec!["host-b", "host-d"]);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn run_lists_both_views() {
        let reg = registry().with_machines(machines(&["A", "B", "C"]));
        let report = checker(reg).run().await.unwrap();

        assert_eq!(report.active_machines, 3);
        assert_eq!(report.registered_machines, 4);
        assert_eq!(report.missing_hostnames, vec!["host-d"]);
    }

    #[tokio::test]
    async fn run_with_empty_namespace_reports_nothing() {
        let reg = StaticRegistry::new().with_machines(machines(&["A"]));
        let report = checker(reg).run().await.unwrap();
        assert_eq!(report.registered_machines, 0);
        assert!(report.missing_hostnames.is_empty());
    }

    #[tokio::test]
    async fn run_aborts_on_listing_failure() {
        let reg = registry().failing_listing("machines");
        assert!(checker(reg).run().await.is_err());
    }

    #[tokio::test]
    async fn custom_namespace_is_used_for_lookups() {
        let reg = StaticRegistry::new()
            .with_machines(machines(&["A"]))
            .with_key("/hosts/A/hostname", "host-a")
            .with_key("/hosts/B/hostname", "host-b");
        let checker = ConsistencyChecker::new(Arc::new(reg), "/hosts/", Duration::from_secs(1));

        let report = checker.run().await.unwrap();
        assert_eq!(report.missing_hostnames, vec!["host-b"]);
    }
}
