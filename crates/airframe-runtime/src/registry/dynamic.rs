//! Registry whose endpoint list is polled from an external config source.
//!
//! Each poll cycle reads one key, skips content whose SHA-256 matches the
//! accepted document, and otherwise parses the document all-or-nothing. A
//! failed cycle records `last_error` and leaves the live snapshot untouched.
//!
//! Cycles are serialized: the background loop and explicit
//! [`DynamicRegistry::poll_once`] calls never interleave, and the snapshot and
//! health table change together.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use airframe_core::{
    ConfigSource, EndpointDescriptor, EndpointRegistry, GatewaySettings, HealthProbePort,
    HealthState, SnapshotCallback, TaskHandle,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::RegistryError;
use super::health_table::{HealthTable, cancel_task, lock, replace_task, spawn_periodic};
use super::schema::parse_endpoint_document;

/// Configuration for [`DynamicRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicRegistryConfig {
    /// Key holding the endpoint document.
    pub key: String,
    /// Delay between poll cycles.
    pub poll_interval: Duration,
    /// Retry failed JSON parses as YAML.
    pub yaml_fallback: bool,
}

impl DynamicRegistryConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self::from_settings(key, &GatewaySettings::default())
    }

    pub fn from_settings(key: impl Into<String>, settings: &GatewaySettings) -> Self {
        Self {
            key: key.into(),
            poll_interval: settings.effective_poll_interval(),
            yaml_fallback: settings.effective_yaml_fallback(),
        }
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_yaml_fallback(mut self, enabled: bool) -> Self {
        self.yaml_fallback = enabled;
        self
    }
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A new snapshot was accepted and subscribers were notified.
    Updated { endpoints: Vec<EndpointDescriptor> },
    /// The document matches the accepted one.
    Unchanged,
    /// Read or parse failure; the previous snapshot is kept.
    Failed { reason: String },
}

#[derive(Debug, Default)]
struct Snapshot {
    endpoints: Vec<EndpointDescriptor>,
    accepted_hash: Option<String>,
    last_error: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

/// One `watch` registration.
#[derive(Clone)]
struct Subscriber {
    id: u64,
    callback: SnapshotCallback,
    token: CancellationToken,
    /// Set once the subscriber has seen any snapshot.
    primed: Arc<AtomicBool>,
}

impl Subscriber {
    fn deliver(&self, endpoints: Vec<EndpointDescriptor>) {
        self.primed.store(true, Ordering::SeqCst);
        (self.callback)(endpoints);
    }
}

struct Inner {
    source: Arc<dyn ConfigSource>,
    config: DynamicRegistryConfig,
    /// Held for the whole of a poll cycle.
    cycle: AsyncMutex<()>,
    snapshot: RwLock<Snapshot>,
    health: HealthTable,
    prober: Option<Arc<dyn HealthProbePort>>,
    next_subscriber: AtomicU64,
    // Lock order: `poll_task` before `subscribers`.
    subscribers: Mutex<Vec<Subscriber>>,
    poll_task: Mutex<Option<TaskHandle>>,
    monitor: Mutex<Option<TaskHandle>>,
}

/// Endpoint registry fed by a [`ConfigSource`] key.
///
/// Cloning shares the same state.
#[derive(Clone)]
pub struct DynamicRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DynamicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicRegistry")
            .field("source", &self.inner.source.describe())
            .field("config", &self.inner.config)
            .field("has_prober", &self.inner.prober.is_some())
            .finish_non_exhaustive()
    }
}

fn content_hash(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

impl DynamicRegistry {
    /// Create a registry without a health prober. Nothing is read until the
    /// first poll.
    pub fn new(
        source: Arc<dyn ConfigSource>,
        config: DynamicRegistryConfig,
    ) -> Result<Self, RegistryError> {
        Self::build(source, config, None)
    }

    /// Create a registry whose health checks use `prober`.
    pub fn new_with_prober(
        source: Arc<dyn ConfigSource>,
        config: DynamicRegistryConfig,
        prober: Arc<dyn HealthProbePort>,
    ) -> Result<Self, RegistryError> {
        Self::build(source, config, Some(prober))
    }

    fn build(
        source: Arc<dyn ConfigSource>,
        config: DynamicRegistryConfig,
        prober: Option<Arc<dyn HealthProbePort>>,
    ) -> Result<Self, RegistryError> {
        if config.key.trim().is_empty() {
            return Err(RegistryError::EmptyKey);
        }
        if config.poll_interval.is_zero() {
            return Err(RegistryError::ZeroInterval("poll interval"));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                source,
                config,
                cycle: AsyncMutex::new(()),
                snapshot: RwLock::new(Snapshot::default()),
                health: HealthTable::default(),
                prober,
                next_subscriber: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
                poll_task: Mutex::new(None),
                monitor: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &DynamicRegistryConfig {
        &self.inner.config
    }

    pub fn has_prober(&self) -> bool {
        self.inner.prober.is_some()
    }

    /// Most recent read/parse failure, cleared by the next successful cycle.
    pub async fn last_error(&self) -> Option<String> {
        self.inner.snapshot.read().await.last_error.clone()
    }

    /// When the current snapshot was accepted.
    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.snapshot.read().await.updated_at
    }

    /// Run one poll cycle now. Waits for a cycle already in progress.
    pub async fn poll_once(&self) -> PollOutcome {
        self.inner.poll_once().await
    }

    /// Whether the shared poll loop is running.
    pub fn is_polling(&self) -> bool {
        lock(&self.inner.poll_task)
            .as_ref()
            .is_some_and(|h| !h.is_cancelled())
    }

    /// Live `watch` subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers)
            .iter()
            .filter(|s| !s.token.is_cancelled())
            .count()
    }

    /// Probe every current endpoint once. No-op without a prober.
    pub async fn check_health(&self) {
        self.inner.check_health().await;
    }

    /// Probe one endpoint. `None` for unknown names or without a prober.
    pub async fn check_health_for(&self, name: &str) -> Option<HealthState> {
        let prober = self.inner.prober.as_ref()?;
        let endpoint = self
            .inner
            .snapshot
            .read()
            .await
            .endpoints
            .iter()
            .find(|e| e.name == name)
            .cloned()?;
        Some(self.inner.health.probe_one(&endpoint, prober.as_ref()).await)
    }

    /// Start the background health monitor, replacing a running one.
    pub fn start_health_monitor(&self, interval: Duration) -> Result<TaskHandle, RegistryError> {
        if interval.is_zero() {
            return Err(RegistryError::ZeroInterval("health check interval"));
        }
        let weak = Arc::downgrade(&self.inner);
        let handle = spawn_periodic("dynamic-health-monitor", interval, move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.check_health().await;
                }
            }
        });
        replace_task(&self.inner.monitor, handle.clone());
        Ok(handle)
    }

    /// Stop the background health monitor. Idempotent.
    pub fn stop_health_monitor(&self) {
        cancel_task(&self.inner.monitor);
    }

    /// Stop the poll loop and end every subscription. Idempotent; a later
    /// `watch` starts a new loop.
    pub fn stop(&self) {
        let mut poll_task = lock(&self.inner.poll_task);
        lock(&self.inner.subscribers).clear();
        if let Some(handle) = poll_task.take() {
            handle.cancel();
        }
    }
}

impl Inner {
    // The loop holds a weak reference so dropping the registry ends it.
    fn spawn_poll_loop(self: &Arc<Self>) -> TaskHandle {
        let weak = Arc::downgrade(self);
        let handle = spawn_periodic("dynamic-registry-poll", self.config.poll_interval, move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.poll_once().await;
                }
            }
        });
        info!(
            key = %self.config.key,
            source = %self.source.describe(),
            "Started endpoint polling"
        );
        handle
    }

    async fn poll_once(&self) -> PollOutcome {
        let _cycle = self.cycle.lock().await;
        let key = &self.config.key;
        let raw = match self.source.read(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return self
                    .record_failure(format!("key '{key}' not found in {}", self.source.describe()))
                    .await;
            }
            Err(e) => return self.record_failure(e.to_string()).await,
        };

        let hash = content_hash(&raw);
        {
            let mut snapshot = self.snapshot.write().await;
            if snapshot.accepted_hash.as_deref() == Some(hash.as_str()) {
                snapshot.last_error = None;
                debug!(key = %key, "Endpoint document unchanged");
                return PollOutcome::Unchanged;
            }
        }

        let endpoints = match parse_endpoint_document(&raw, self.config.yaml_fallback) {
            Ok(endpoints) => endpoints,
            Err(e) => return self.record_failure(e.to_string()).await,
        };

        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.endpoints.clone_from(&endpoints);
            snapshot.accepted_hash = Some(hash);
            snapshot.last_error = None;
            snapshot.updated_at = Some(Utc::now());
            self.health.reconcile(&endpoints).await;
        }

        info!(
            key = %key,
            endpoints = endpoints.len(),
            "Accepted new endpoint snapshot"
        );
        self.notify(&endpoints);
        PollOutcome::Updated { endpoints }
    }

    async fn record_failure(&self, reason: String) -> PollOutcome {
        warn!(key = %self.config.key, error = %reason, "Endpoint poll failed; keeping last snapshot");
        self.snapshot.write().await.last_error = Some(reason.clone());
        PollOutcome::Failed { reason }
    }

    fn notify(&self, endpoints: &[EndpointDescriptor]) {
        let subscribers = lock(&self.subscribers).clone();
        for subscriber in subscribers.iter().filter(|s| !s.token.is_cancelled()) {
            subscriber.deliver(endpoints.to_vec());
        }
    }

    fn subscriber(&self, id: u64) -> Option<Subscriber> {
        lock(&self.subscribers).iter().find(|s| s.id == id).cloned()
    }

    /// Hand a new subscriber the accepted snapshot unless a cycle already
    /// delivered one.
    async fn prime(&self, id: u64) {
        let _cycle = self.cycle.lock().await;
        let Some(subscriber) = self.subscriber(id) else {
            return;
        };
        if subscriber.primed.load(Ordering::SeqCst) || subscriber.token.is_cancelled() {
            return;
        }
        if let Some(snapshot) = self.accepted_snapshot().await {
            subscriber.deliver(snapshot);
        }
    }

    /// Remove a subscription; the poll loop stops with the last one.
    fn unsubscribe(&self, id: u64) {
        let mut poll_task = lock(&self.poll_task);
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|s| s.id != id);
        if subscribers.is_empty() {
            if let Some(handle) = poll_task.take() {
                debug!(key = %self.config.key, "Last subscriber left; stopping endpoint polling");
                handle.cancel();
            }
        }
    }

    /// The snapshot if one was ever accepted.
    async fn accepted_snapshot(&self) -> Option<Vec<EndpointDescriptor>> {
        let snapshot = self.snapshot.read().await;
        snapshot
            .accepted_hash
            .is_some()
            .then(|| snapshot.endpoints.clone())
    }

    async fn check_health(&self) {
        let Some(prober) = &self.prober else {
            return;
        };
        let endpoints = self.snapshot.read().await.endpoints.clone();
        self.health.probe_all(&endpoints, prober.as_ref()).await;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        cancel_task(&self.poll_task);
        cancel_task(&self.monitor);
    }
}

#[async_trait]
impl EndpointRegistry for DynamicRegistry {
    async fn list_endpoints(&self) -> Vec<EndpointDescriptor> {
        self.inner.snapshot.read().await.endpoints.clone()
    }

    async fn get_health(&self, name: &str) -> Option<HealthState> {
        self.inner.health.get(name).await
    }

    async fn set_health(&self, name: &str, state: HealthState) {
        if !self.inner.health.set(name, state).await {
            debug!(endpoint = %name, "Ignoring health update for unknown endpoint");
        }
    }

    /// Register a subscriber.
    ///
    /// The first subscriber starts the shared poll loop (first cycle
    /// immediately, then every `poll_interval`). Each subscriber receives the
    /// accepted snapshot, if any, once on joining, then every later update.
    ///
    /// The returned handle is the subscription: cancelling it unsubscribes
    /// this callback only, and the loop stops when no subscriber is left.
    /// [`DynamicRegistry::stop`] ends every subscription.
    fn watch(&self, callback: SnapshotCallback) -> TaskHandle {
        let mut poll_task = lock(&self.inner.poll_task);
        let poll_loop = match poll_task.as_ref().filter(|h| !h.is_cancelled()) {
            Some(running) => running.clone(),
            None => {
                let handle = self.inner.spawn_poll_loop();
                *poll_task = Some(handle.clone());
                handle
            }
        };

        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let token = poll_loop.token().child_token();
        lock(&self.inner.subscribers).push(Subscriber {
            id,
            callback,
            token: token.clone(),
            primed: Arc::new(AtomicBool::new(false)),
        });
        drop(poll_task);
        debug!(key = %self.inner.config.key, subscriber = id, "Registered snapshot subscriber");

        let weak = Arc::downgrade(&self.inner);
        TaskHandle::spawn_with_token(token, move |token| async move {
            if let Some(inner) = weak.upgrade() {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {}
                    () = inner.prime(id) => {}
                }
            }
            token.cancelled().await;
            if let Some(inner) = weak.upgrade() {
                inner.unsubscribe(id);
            }
        })
    }
}
