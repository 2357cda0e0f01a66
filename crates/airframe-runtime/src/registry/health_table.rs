//! Shared health table and the periodic loop driving registry background work.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use airframe_core::{EndpointDescriptor, HealthProbePort, HealthState, TaskHandle};
use futures_util::FutureExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Health states keyed by endpoint name.
///
/// Only names registered through [`HealthTable::reconcile`] (or
/// construction) can hold a state.
#[derive(Debug, Clone, Default)]
pub(crate) struct HealthTable {
    states: Arc<RwLock<HashMap<String, HealthState>>>,
}

impl HealthTable {
    /// A table with every endpoint `unknown`.
    pub(crate) fn for_endpoints(endpoints: &[EndpointDescriptor]) -> Self {
        let states = endpoints
            .iter()
            .map(|e| (e.name.clone(), HealthState::unknown()))
            .collect();
        Self {
            states: Arc::new(RwLock::new(states)),
        }
    }

    pub(crate) async fn get(&self, name: &str) -> Option<HealthState> {
        self.states.read().await.get(name).cloned()
    }

    /// Replace a state. Returns false (and changes nothing) for unknown names.
    pub(crate) async fn set(&self, name: &str, state: HealthState) -> bool {
        match self.states.write().await.get_mut(name) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => false,
        }
    }

    /// Align the table with a new snapshot: surviving names keep their
    /// state, new names start `unknown`, removed names are dropped.
    pub(crate) async fn reconcile(&self, endpoints: &[EndpointDescriptor]) {
        let mut states = self.states.write().await;
        let mut next = HashMap::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let state = states.remove(&endpoint.name).unwrap_or_default();
            next.insert(endpoint.name.clone(), state);
        }
        *states = next;
    }

    /// Probe every endpoint once, sequentially in list order.
    pub(crate) async fn probe_all(
        &self,
        endpoints: &[EndpointDescriptor],
        prober: &dyn HealthProbePort,
    ) {
        for endpoint in endpoints {
            let state = prober.check(endpoint).await;
            self.set(&endpoint.name, state).await;
        }
    }

    /// Probe one endpoint and store the result.
    pub(crate) async fn probe_one(
        &self,
        endpoint: &EndpointDescriptor,
        prober: &dyn HealthProbePort,
    ) -> HealthState {
        let state = prober.check(endpoint).await;
        self.set(&endpoint.name, state.clone()).await;
        state
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `cycle` now and then every `interval` until cancelled.
///
/// A panicking cycle is logged and the loop carries on. Cancellation is
/// observed both while a cycle runs and while sleeping.
pub(crate) fn spawn_periodic<F, Fut>(label: &'static str, interval: Duration, cycle: F) -> TaskHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    TaskHandle::spawn(move |cancel_token| async move {
        info!(task = label, interval_ms = interval.as_millis(), "Background loop started");
        loop {
            tokio::select! {
                biased;
                () = cancel_token.cancelled() => break,
                result = AssertUnwindSafe(cycle()).catch_unwind() => {
                    if result.is_err() {
                        warn!(task = label, "Background cycle panicked; continuing");
                    }
                }
            }

            tokio::select! {
                biased;
                () = cancel_token.cancelled() => break,
                () = tokio::time::sleep(interval) => debug!(task = label, "Background loop tick"),
            }
        }
        info!(task = label, "Background loop stopped");
    })
}

/// Replace the handle in `slot`, cancelling any previous one.
pub(crate) fn replace_task(slot: &Mutex<Option<TaskHandle>>, handle: TaskHandle) {
    if let Some(previous) = lock(slot).replace(handle) {
        previous.cancel();
    }
}

/// Cancel and clear the handle in `slot`, if any.
pub(crate) fn cancel_task(slot: &Mutex<Option<TaskHandle>>) {
    if let Some(handle) = lock(slot).take() {
        handle.cancel();
    }
}
