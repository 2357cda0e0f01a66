//! Probe command handler.

use anyhow::{Result, bail};

use super::{format_row, header, print_health_table};
use crate::bootstrap::CliContext;

/// Probe one endpoint by name, or every endpoint when `name` is `None`.
pub async fn execute(ctx: &CliContext, name: Option<&str>) -> Result<()> {
    let registry = ctx.catalog_registry().await?;

    let Some(name) = name else {
        registry.check_health().await;
        print_health_table(&registry).await;
        return Ok(());
    };

    let Some(health) = registry.check_health_for(name).await else {
        bail!("unknown endpoint '{name}'");
    };
    if let Some(endpoint) = registry.endpoint(name) {
        println!("{}", header());
        println!("{}", format_row(&endpoint, &health));
    }
    Ok(())
}
