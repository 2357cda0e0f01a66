//! Endpoint registry port.
//!
//! A registry owns a snapshot of endpoint descriptors plus a health table
//! keyed by endpoint name. Consumers always receive clones.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{EndpointDescriptor, HealthState};
use crate::task::TaskHandle;

/// Callback invoked with a full endpoint snapshot.
pub type SnapshotCallback = Arc<dyn Fn(Vec<EndpointDescriptor>) + Send + Sync>;

/// Read interface shared by static and dynamic registries.
#[async_trait]
pub trait EndpointRegistry: Send + Sync {
    /// Current endpoints in snapshot order.
    async fn list_endpoints(&self) -> Vec<EndpointDescriptor>;

    /// Health of the named endpoint, `None` if the name is not registered.
    async fn get_health(&self, name: &str) -> Option<HealthState>;

    /// Replace the health of the named endpoint.
    ///
    /// Unknown names are ignored.
    async fn set_health(&self, name: &str, state: HealthState);

    /// Endpoints whose status is exactly `healthy`, in snapshot order.
    async fn list_healthy_endpoints(&self) -> Vec<EndpointDescriptor> {
        let mut healthy = Vec::new();
        for endpoint in self.list_endpoints().await {
            if self
                .get_health(&endpoint.name)
                .await
                .is_some_and(|h| h.is_healthy())
            {
                healthy.push(endpoint);
            }
        }
        healthy
    }

    /// Default selection policy: the first healthy endpoint.
    async fn first_healthy_endpoint(&self) -> Option<EndpointDescriptor> {
        self.list_healthy_endpoints().await.into_iter().next()
    }

    /// Subscribe to snapshots.
    ///
    /// Callbacks must not block: they run on the registry's background task
    /// or on the task that triggered a refresh.
    fn watch(&self, callback: SnapshotCallback) -> TaskHandle;
}
