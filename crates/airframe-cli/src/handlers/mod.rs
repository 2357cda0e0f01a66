//! Command handlers.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that:
//!   1. Parse/validate CLI-specific input
//!   2. Call registry or gateway methods
//!   3. Format output for the terminal

pub mod endpoints;
pub mod infer;
pub mod probe;
pub mod watch;

use airframe_core::{EndpointDescriptor, EndpointRegistry, HealthState};

/// Header matching [`format_row`].
pub(crate) fn header() -> String {
    format!(
        "{:<20} {:<10} {:<40} {:<10} {}",
        "NAME", "KIND", "URL", "STATUS", "DETAIL"
    )
}

/// One endpoint line of a health table.
pub(crate) fn format_row(endpoint: &EndpointDescriptor, health: &HealthState) -> String {
    let detail = if health.was_probed() {
        health.detail.as_str()
    } else {
        "--"
    };
    format!(
        "{:<20} {:<10} {:<40} {:<10} {}",
        endpoint.name,
        endpoint.backend_kind.as_str(),
        endpoint.base_url,
        health.status.as_str(),
        detail
    )
}

/// Print every endpoint of `registry` with its current health.
pub(crate) async fn print_health_table(registry: &dyn EndpointRegistry) {
    println!("{}", header());
    for endpoint in registry.list_endpoints().await {
        let health = registry.get_health(&endpoint.name).await.unwrap_or_default();
        println!("{}", format_row(&endpoint, &health));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airframe_core::{BackendKind, HealthStatus};

    #[test]
    fn test_format_row() {
        let endpoint = EndpointDescriptor::new("gpu-1", "http://10.0.0.4:8080", BackendKind::LlamaCpp);

        let unprobed = format_row(&endpoint, &HealthState::unknown());
        assert!(unprobed.starts_with("gpu-1"));
        assert!(unprobed.contains("llamacpp"));
        assert!(unprobed.contains("unknown"));
        assert!(unprobed.ends_with("--"));

        let probed = format_row(
            &endpoint,
            &HealthState::checked(HealthStatus::Degraded, "HTTP 404"),
        );
        assert!(probed.contains("degraded"));
        assert!(probed.ends_with("HTTP 404"));
    }
}
