//! Cluster size gate.

use std::sync::Arc;

use fleetcheck_core::{CheckResult, Point, Threshold};
use fleetcheck_registry::{BoxFuture, RegistryGateway};

use super::{Check, failed};
use crate::error::CheckOutcome;

pub const CLUSTER_SIZE_METRIC: &str = "fleet.cluster_size";

/// Classifies the number of active machines against a threshold.
#[derive(Clone)]
pub struct ClusterSizeCheck {
    gateway: Arc<dyn RegistryGateway>,
    threshold: Threshold,
}

impl ClusterSizeCheck {
    pub fn new(gateway: Arc<dyn RegistryGateway>, threshold: Threshold) -> Self {
        Self { gateway, threshold }
    }

    async fn evaluate(&self) -> CheckOutcome<CheckResult> {
        let size = self.gateway.list_machines().await?.len() as f64;
        let level = self.threshold.classify(size);

        Ok(CheckResult::new(level, format!("The cluster size is {size}"))
            .with_point(Point::new(CLUSTER_SIZE_METRIC, size)))
    }
}

impl Check for ClusterSizeCheck {
    fn run(&self) -> BoxFuture<'_, CheckResult> {
        Box::pin(async move { self.evaluate().await.unwrap_or_else(failed) })
    }
}
