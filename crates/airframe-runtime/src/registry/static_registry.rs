//! Registry over a fixed endpoint list.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use airframe_core::{
    EndpointDescriptor, EndpointRegistry, HealthProbePort, HealthState, SnapshotCallback,
    TaskHandle,
};
use async_trait::async_trait;
use tracing::debug;

use super::RegistryError;
use super::health_table::{HealthTable, cancel_task, replace_task, spawn_periodic};
use super::schema::find_duplicate;

/// Immutable endpoint list with a mutable health table.
///
/// # Example
///
/// ```ignore
/// let registry = StaticRegistry::new(endpoints)?.with_prober(Arc::new(probe));
/// let monitor = registry.start_health_monitor(Duration::from_secs(30))?;
/// let target = registry.first_healthy_endpoint().await;
/// ```
pub struct StaticRegistry {
    endpoints: Arc<Vec<EndpointDescriptor>>,
    health: HealthTable,
    prober: Option<Arc<dyn HealthProbePort>>,
    monitor: Mutex<Option<TaskHandle>>,
}

impl std::fmt::Debug for StaticRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticRegistry")
            .field("endpoints", &self.endpoints.len())
            .field("has_prober", &self.prober.is_some())
            .finish_non_exhaustive()
    }
}

impl StaticRegistry {
    /// Create a registry; every endpoint starts `unknown`.
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Result<Self, RegistryError> {
        if let Some(name) = find_duplicate(&endpoints) {
            return Err(RegistryError::DuplicateEndpoint(name.to_string()));
        }
        Ok(Self {
            health: HealthTable::for_endpoints(&endpoints),
            endpoints: Arc::new(endpoints),
            prober: None,
            monitor: Mutex::new(None),
        })
    }

    /// Attach a health prober.
    #[must_use]
    pub fn with_prober(mut self, prober: Arc<dyn HealthProbePort>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn has_prober(&self) -> bool {
        self.prober.is_some()
    }

    /// The endpoint registered under `name`.
    pub fn endpoint(&self, name: &str) -> Option<EndpointDescriptor> {
        self.endpoints.iter().find(|e| e.name == name).cloned()
    }

    /// Probe every endpoint once, in list order. No-op without a prober.
    pub async fn check_health(&self) {
        if let Some(prober) = &self.prober {
            self.health.probe_all(&self.endpoints, prober.as_ref()).await;
        }
    }

    /// Probe one endpoint. `None` for unknown names or without a prober.
    pub async fn check_health_for(&self, name: &str) -> Option<HealthState> {
        let prober = self.prober.as_ref()?;
        let endpoint = self.endpoints.iter().find(|e| e.name == name)?;
        Some(self.health.probe_one(endpoint, prober.as_ref()).await)
    }

    /// Start the background health monitor.
    ///
    /// A monitor that is already running is cancelled and replaced. Without a
    /// prober the loop still runs but each cycle does nothing.
    pub fn start_health_monitor(&self, interval: Duration) -> Result<TaskHandle, RegistryError> {
        if interval.is_zero() {
            return Err(RegistryError::ZeroInterval("health check interval"));
        }
        let endpoints = Arc::clone(&self.endpoints);
        let health = self.health.clone();
        let prober = self.prober.clone();
        let handle = spawn_periodic("static-health-monitor", interval, move || {
            let endpoints = Arc::clone(&endpoints);
            let health = health.clone();
            let prober = prober.clone();
            async move {
                if let Some(prober) = prober {
                    health.probe_all(&endpoints, prober.as_ref()).await;
                }
            }
        });
        replace_task(&self.monitor, handle.clone());
        Ok(handle)
    }

    /// Stop the background health monitor. Idempotent.
    pub fn stop_health_monitor(&self) {
        cancel_task(&self.monitor);
    }
}

impl Drop for StaticRegistry {
    fn drop(&mut self) {
        cancel_task(&self.monitor);
    }
}

#[async_trait]
impl EndpointRegistry for StaticRegistry {
    async fn list_endpoints(&self) -> Vec<EndpointDescriptor> {
        self.endpoints.as_ref().clone()
    }

    async fn get_health(&self, name: &str) -> Option<HealthState> {
        self.health.get(name).await
    }

    async fn set_health(&self, name: &str, state: HealthState) {
        if !self.health.set(name, state).await {
            debug!(endpoint = %name, "Ignoring health update for unknown endpoint");
        }
    }

    /// Fires once, on a background task, with the fixed list.
    fn watch(&self, callback: SnapshotCallback) -> TaskHandle {
        let snapshot = self.endpoints.as_ref().clone();
        TaskHandle::spawn(move |_| async move { callback(snapshot) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airframe_core::{BackendKind, HealthStatus};
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        Prober {}

        #[async_trait]
        impl HealthProbePort for Prober {
            async fn check(&self, endpoint: &EndpointDescriptor) -> HealthState;
        }
    }

    fn endpoints(names: &[&str]) -> Vec<EndpointDescriptor> {
        names
            .iter()
            .map(|n| EndpointDescriptor::new(*n, format!("http://{n}"), BackendKind::LlamaCpp))
            .collect()
    }

    #[tokio::test]
    async fn test_construction_and_listing() {
        let registry = StaticRegistry::new(endpoints(&["b", "a"])).unwrap();
        let names: Vec<_> = registry
            .list_endpoints()
            .await
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(
            registry.get_health("a").await.unwrap().status,
            HealthStatus::Unknown
        );
        assert!(registry.get_health("zzz").await.is_none());
        assert_eq!(registry.endpoint("a").unwrap().base_url, "http://a");
        assert!(registry.endpoint("zzz").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = StaticRegistry::new(endpoints(&["a", "b", "a"])).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateEndpoint("a".to_string()));
    }

    #[tokio::test]
    async fn test_set_health_unknown_name_is_noop() {
        let registry = StaticRegistry::new(endpoints(&["a"])).unwrap();
        registry
            .set_health("ghost", HealthState::with_status(HealthStatus::Healthy))
            .await;
        assert!(registry.get_health("ghost").await.is_none());
        assert!(registry.list_healthy_endpoints().await.is_empty());
    }

    #[tokio::test]
    async fn test_check_health_probes_in_order() {
        let mut prober = MockProber::new();
        let mut seq = mockall::Sequence::new();
        prober
            .expect_check()
            .withf(|e| e.name == "a")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| HealthState::checked(HealthStatus::Healthy, "HTTP 200"));
        prober
            .expect_check()
            .withf(|e| e.name == "b")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| HealthState::checked(HealthStatus::Unhealthy, "HTTP 503"));

        let registry = StaticRegistry::new(endpoints(&["a", "b"]))
            .unwrap()
            .with_prober(Arc::new(prober));
        registry.check_health().await;

        let healthy: Vec<_> = registry
            .list_healthy_endpoints()
            .await
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(healthy, vec!["a"]);
        assert_eq!(
            registry.get_health("b").await.unwrap().detail,
            "HTTP 503"
        );
    }

    #[tokio::test]
    async fn test_check_health_for() {
        let mut prober = MockProber::new();
        prober
            .expect_check()
            .times(1)
            .returning(|_| HealthState::checked(HealthStatus::Degraded, "HTTP 429"));
        let registry = StaticRegistry::new(endpoints(&["a"]))
            .unwrap()
            .with_prober(Arc::new(prober));

        assert!(registry.check_health_for("nope").await.is_none());
        let state = registry.check_health_for("a").await.unwrap();
        assert_eq!(state.status, HealthStatus::Degraded);
        assert_eq!(registry.get_health("a").await, Some(state));
    }

    #[tokio::test]
    async fn test_check_health_without_prober() {
        let registry = StaticRegistry::new(endpoints(&["a"])).unwrap();
        registry.check_health().await;
        assert!(registry.check_health_for("a").await.is_none());
        assert!(!registry.get_health("a").await.unwrap().was_probed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_monitor_runs_until_stopped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut prober = MockProber::new();
        prober.expect_check().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            HealthState::checked(HealthStatus::Healthy, "HTTP 200")
        });
        let registry = StaticRegistry::new(endpoints(&["a", "b"]))
            .unwrap()
            .with_prober(Arc::new(prober));

        let handle = registry
            .start_health_monitor(Duration::from_secs(10))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(15)).await;
        registry.stop_health_monitor();
        registry.stop_health_monitor();
        handle.join().await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(registry.list_healthy_endpoints().await.len(), 2);
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let registry = StaticRegistry::new(Vec::new()).unwrap();
        assert!(matches!(
            registry.start_health_monitor(Duration::ZERO),
            Err(RegistryError::ZeroInterval(_))
        ));
    }

    #[tokio::test]
    async fn test_watch_fires_once_with_snapshot() {
        let registry = StaticRegistry::new(endpoints(&["a", "b"])).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = registry.watch(Arc::new(move |snapshot| {
            sink.lock().unwrap().push(snapshot.len());
        }));
        handle.join().await;
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }
}
