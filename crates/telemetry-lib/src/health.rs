//! Health check infrastructure for the collector
//!
//! Tracks whether each producer is delivering data so an operator can tell a
//! degraded collector (STATS only, empty PROCS/DISK) from a healthy one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Producing data normally
    Healthy,
    /// Recovering from failures; records are still emitted, possibly empty
    Degraded,
    /// Not producing data
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failures since the component was last healthy
    #[serde(default)]
    pub consecutive_failures: u32,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None, 0)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()), 1)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()), 1)
    }

    fn with_status(status: ComponentStatus, message: Option<String>, failures: u32) -> Self {
        Self {
            status,
            message,
            consecutive_failures: failures,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|health| health.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }

    /// Names of components that are not healthy, sorted
    pub fn failing_components(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .components
            .iter()
            .filter(|(_, health)| health.status != ComponentStatus::Healthy)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    /// The sampling loop itself (STATS records)
    pub const COLLECTOR: &str = "collector";
    /// Process enumeration (PROCS records)
    pub const PROCESSES: &str = "processes";
    /// Disk enumeration (DISK records)
    pub const DISKS: &str = "disks";

    pub const ALL: &[&str] = &[COLLECTOR, PROCESSES, DISKS];
}

/// Consecutive failed ticks after which the sampling loop is unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Health registry shared between the scheduler and the HTTP endpoint
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Registry with every collector component registered as healthy
    pub async fn with_collector_components() -> Self {
        let registry = Self::new();
        for name in components::ALL {
            registry.register(name).await;
        }
        registry
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Record the outcome of one fetch for a component
    ///
    /// A success resets the component to healthy. A failure marks it
    /// degraded and counts consecutive failures. The sampling loop itself
    /// turns unhealthy after [`UNHEALTHY_AFTER_FAILURES`] failed ticks in a
    /// row, since no STATS are written meanwhile; process and disk producers
    /// only degrade because their records are still emitted, empty.
    pub async fn record_outcome(&self, name: &str, failure: Option<String>) {
        let mut components = self.components.write().await;
        match failure {
            None => {
                let healthy = components
                    .get(name)
                    .is_some_and(|h| h.status == ComponentStatus::Healthy);
                if !healthy {
                    components.insert(name.to_string(), ComponentHealth::healthy());
                }
            }
            Some(message) => {
                let failures = components
                    .get(name)
                    .map(|h| h.consecutive_failures)
                    .unwrap_or(0)
                    .saturating_add(1);
                let mut health =
                    if name == components::COLLECTOR && failures >= UNHEALTHY_AFTER_FAILURES {
                        ComponentHealth::unhealthy(message)
                    } else {
                        ComponentHealth::degraded(message)
                    };
                health.consecutive_failures = failures;
                components.insert(name.to_string(), health);
            }
        }
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Get readiness response
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Collector not yet primed".to_string()),
            }
        } else if health.status == ComponentStatus::Unhealthy {
            ReadinessResponse {
                ready: false,
                reason: Some(format!(
                    "Unhealthy components: {}",
                    health.failing_components().join(", ")
                )),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_collector_components_registered() {
        let registry = HealthRegistry::with_collector_components().await;

        let health = registry.health().await;
        assert_eq!(health.components.len(), 3);
        for name in components::ALL {
            assert_eq!(health.components[*name].status, ComponentStatus::Healthy);
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_degrades_overall_status() {
        let registry = HealthRegistry::with_collector_components().await;

        registry
            .record_outcome(components::PROCESSES, Some("permission denied".into()))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(health.failing_components(), vec![components::PROCESSES]);
        assert!(health.status.is_operational());
    }

    #[tokio::test]
    async fn test_consecutive_failures_counted_and_reset() {
        let registry = HealthRegistry::with_collector_components().await;

        for _ in 0..3 {
            registry
                .record_outcome(components::DISKS, Some("unreadable".into()))
                .await;
        }
        let health = registry.health().await;
        assert_eq!(health.components[components::DISKS].consecutive_failures, 3);

        registry.record_outcome(components::DISKS, None).await;
        let health = registry.health().await;
        assert_eq!(health.components[components::DISKS].status, ComponentStatus::Healthy);
        assert_eq!(health.components[components::DISKS].consecutive_failures, 0);
    }

    async fn fail_collector(registry: &HealthRegistry, times: u32) {
        for _ in 0..times {
            registry
                .record_outcome(components::COLLECTOR, Some("CPU provider unavailable".into()))
                .await;
        }
    }

    #[tokio::test]
    async fn test_collector_unhealthy_after_repeated_tick_failures() {
        let registry = HealthRegistry::with_collector_components().await;

        fail_collector(&registry, UNHEALTHY_AFTER_FAILURES - 1).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);

        fail_collector(&registry, 1).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(!health.status.is_operational());

        registry.record_outcome(components::COLLECTOR, None).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_producers_never_escalate_past_degraded() {
        let registry = HealthRegistry::with_collector_components().await;

        for _ in 0..UNHEALTHY_AFTER_FAILURES * 2 {
            registry
                .record_outcome(components::PROCESSES, Some("denied".into()))
                .await;
        }

        let health = registry.health().await;
        assert_eq!(health.components[components::PROCESSES].status, ComponentStatus::Degraded);
        assert_eq!(health.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_unhealthy_wins_over_degraded() {
        let registry = HealthRegistry::with_collector_components().await;
        registry
            .record_outcome(components::DISKS, Some("slow".into()))
            .await;
        fail_collector(&registry, UNHEALTHY_AFTER_FAILURES).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(
            health.failing_components(),
            vec![components::COLLECTOR, components::DISKS]
        );
    }

    #[tokio::test]
    async fn test_readiness_not_ready_until_primed() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Collector not yet primed"));

        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_readiness_survives_degraded_producers() {
        let registry = HealthRegistry::with_collector_components().await;
        registry.set_ready(true).await;
        registry
            .record_outcome(components::PROCESSES, Some("denied".into()))
            .await;

        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::with_collector_components().await;
        registry.set_ready(true).await;
        fail_collector(&registry, UNHEALTHY_AFTER_FAILURES).await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("Unhealthy components: collector")
        );
    }
}
