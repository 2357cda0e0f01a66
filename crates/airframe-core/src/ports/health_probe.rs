//! Health probe port.
//!
//! A probe performs one liveness check against one endpoint and classifies
//! the outcome. Probes are stateless and never fail: every failure mode
//! resolves to a [`HealthState`].

use async_trait::async_trait;

use crate::domain::{EndpointDescriptor, HealthState};

/// Port for single-shot endpoint liveness checks.
#[async_trait]
pub trait HealthProbePort: Send + Sync {
    /// Probe `endpoint` once.
    async fn check(&self, endpoint: &EndpointDescriptor) -> HealthState;
}
