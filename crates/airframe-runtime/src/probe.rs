//! HTTP liveness prober.
//!
//! Single-shot, policy-free health checks. Scheduling lives in the
//! registries; this module only maps one HTTP exchange to a [`HealthState`].

use std::sync::Arc;
use std::time::Duration;

use airframe_core::{
    BackendKind, EndpointDescriptor, GatewaySettings, HealthProbePort, HealthState, HealthStatus,
    HttpMethod, HttpRequest, HttpTransport, TransportError,
};
use async_trait::async_trait;
use tracing::debug;

/// Detail recorded when no transport was injected.
pub const TRANSPORT_NOT_INSTALLED: &str = "transport not installed";

/// Liveness route for a backend kind.
pub const fn liveness_route(kind: BackendKind) -> (HttpMethod, &'static str) {
    match kind {
        BackendKind::LlamaCpp => (HttpMethod::Get, "/health"),
        BackendKind::OpenAiCompatible => (HttpMethod::Get, "/v1/models"),
        BackendKind::Anthropic => (HttpMethod::Head, "/v1/messages"),
    }
}

/// Classify an HTTP status code.
pub const fn classify_status(code: u16) -> HealthStatus {
    match code {
        0..=399 => HealthStatus::Healthy,
        400..=499 => HealthStatus::Degraded,
        _ => HealthStatus::Unhealthy,
    }
}

/// Health prober issuing one request per check over an [`HttpTransport`].
#[derive(Clone)]
pub struct HttpHealthProbe {
    transport: Option<Arc<dyn HttpTransport>>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpHealthProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHealthProbe")
            .field("has_transport", &self.transport.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpHealthProbe {
    pub fn new(transport: Option<Arc<dyn HttpTransport>>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn from_settings(
        transport: Option<Arc<dyn HttpTransport>>,
        settings: &GatewaySettings,
    ) -> Self {
        Self::new(transport, settings.effective_probe_timeout())
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HealthProbePort for HttpHealthProbe {
    async fn check(&self, endpoint: &EndpointDescriptor) -> HealthState {
        let Some(transport) = &self.transport else {
            return HealthState {
                detail: TRANSPORT_NOT_INSTALLED.to_string(),
                ..HealthState::unknown()
            };
        };

        let (method, path) = liveness_route(endpoint.backend_kind);
        let request = HttpRequest::new(method, endpoint.url_for(path)).with_timeout(self.timeout);

        // The transport enforces the deadline too; this guards transports that ignore it.
        let result = tokio::time::timeout(self.timeout, transport.send(request))
            .await
            .unwrap_or_else(|_| Err(TransportError::Timeout("probe deadline elapsed".into())));

        let state = match result {
            Ok(response) => HealthState::checked(
                classify_status(response.status),
                format!("HTTP {}", response.status),
            ),
            Err(TransportError::Timeout(_)) => {
                HealthState::checked(HealthStatus::Unhealthy, "timeout")
            }
            Err(TransportError::Connect(reason)) => HealthState::checked(
                HealthStatus::Unhealthy,
                format!("connection failed: {reason}"),
            ),
            Err(TransportError::Other(reason)) => HealthState::checked(
                HealthStatus::Unknown,
                format!("transport error: {reason}"),
            ),
        };

        debug!(
            endpoint = %endpoint.name,
            status = %state.status,
            detail = %state.detail,
            "Probed endpoint"
        );
        state
    }
}
