//! Watch command handler.
//!
//! Prints every accepted endpoint snapshot as one JSON line until Ctrl-C.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use airframe_core::{EndpointDescriptor, EndpointRegistry, GatewaySettings, SnapshotCallback};
use airframe_runtime::{DynamicRegistry, DynamicRegistryConfig, MountedConfigMapSource};
use anyhow::Result;
use tracing::info;

use crate::bootstrap::CliContext;

/// Registry configuration for `key`, with an optional interval override.
pub fn registry_config(
    key: &str,
    interval_secs: Option<u64>,
    settings: &GatewaySettings,
) -> DynamicRegistryConfig {
    let config = DynamicRegistryConfig::from_settings(key, settings);
    match interval_secs {
        Some(secs) => config.with_poll_interval(Duration::from_secs(secs)),
        None => config,
    }
}

fn snapshot_line(snapshot: &[EndpointDescriptor]) -> String {
    serde_json::to_string(snapshot).unwrap_or_else(|e| format!("<unprintable snapshot: {e}>"))
}

/// Execute the watch command.
pub async fn execute(
    ctx: &CliContext,
    dir: &Path,
    key: &str,
    interval_secs: Option<u64>,
) -> Result<()> {
    let source = Arc::new(MountedConfigMapSource::new(dir));
    let config = registry_config(key, interval_secs, ctx.settings());
    let registry = DynamicRegistry::new(source, config)?;

    let callback: SnapshotCallback = Arc::new(|snapshot: Vec<EndpointDescriptor>| {
        println!("{}", snapshot_line(&snapshot));
    });
    let handle = registry.watch(callback);
    info!(dir = %dir.display(), key, "Watching endpoint document; Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    handle.shutdown().await;
    registry.stop();

    if let Some(error) = registry.last_error().await {
        eprintln!("last poll error: {error}");
    }
    Ok(())
}
