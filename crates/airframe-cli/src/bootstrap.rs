//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI:
//! - Settings (defaults, `AIRFRAME_*` environment, command-line overrides)
//! - The reqwest transport shared by the probe and the adapters
//! - The health probe and gateway client
//!
//! Command handlers receive the composed [`CliContext`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use airframe_core::{GatewaySettings, HttpTransport, validate_settings};
use airframe_runtime::{
    AdapterConfig, GatewayClient, HttpHealthProbe, ReqwestTransport, ReqwestTransportConfig,
    StaticRegistry, parse_endpoint_document,
};
use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Endpoint document used by `endpoints`, `probe` and `infer`.
    pub catalog: Option<PathBuf>,
    /// Effective gateway settings.
    pub settings: GatewaySettings,
}

impl CliConfig {
    /// Defaults overlaid with `AIRFRAME_*` variables, then with flags.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let env = GatewaySettings::from_env().context("invalid AIRFRAME_* environment")?;
        Self::resolve(cli, &env)
    }

    fn resolve(cli: &Cli, env: &GatewaySettings) -> Result<Self> {
        let mut settings = GatewaySettings::with_defaults();
        settings.merge(env);
        settings.merge(&GatewaySettings {
            max_attempts: cli.max_attempts,
            probe_timeout_ms: cli.probe_timeout_ms,
            request_timeout_secs: cli.request_timeout_secs,
            ..GatewaySettings::default()
        });
        validate_settings(&settings)?;

        Ok(Self {
            catalog: cli.catalog.clone(),
            settings,
        })
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub config: CliConfig,
    pub transport: Arc<dyn HttpTransport>,
    pub probe: Arc<HttpHealthProbe>,
    pub gateway: GatewayClient,
}

impl CliContext {
    pub const fn settings(&self) -> &GatewaySettings {
        &self.config.settings
    }

    /// Load the catalog into a probing static registry.
    pub async fn catalog_registry(&self) -> Result<StaticRegistry> {
        let path = self
            .config
            .catalog
            .as_deref()
            .ok_or_else(|| anyhow!("no endpoint catalog; pass --catalog or set AIRFRAME_CATALOG"))?;
        let registry = load_catalog(path, self.settings().effective_yaml_fallback()).await?;
        Ok(registry.with_prober(self.probe.clone()))
    }
}

/// Read and validate an endpoint document from disk.
pub async fn load_catalog(path: &Path, yaml_fallback: bool) -> Result<StaticRegistry> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let endpoints = parse_endpoint_document(&raw, yaml_fallback)
        .with_context(|| format!("invalid catalog {}", path.display()))?;
    debug!(path = %path.display(), endpoints = endpoints.len(), "Loaded catalog");
    Ok(StaticRegistry::new(endpoints)?)
}

/// Compose the CLI context.
pub fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let settings = &config.settings;
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
        ReqwestTransportConfig::from_settings(settings),
    )?);
    let probe = Arc::new(HttpHealthProbe::from_settings(
        Some(transport.clone()),
        settings,
    ));
    let gateway = GatewayClient::new(
        Some(transport.clone()),
        AdapterConfig::from_settings(settings)?,
    );

    Ok(CliContext {
        config,
        transport,
        probe,
        gateway,
    })
}
