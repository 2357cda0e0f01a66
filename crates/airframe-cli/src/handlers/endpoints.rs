//! Endpoints command handler.

use anyhow::Result;

use super::print_health_table;
use crate::bootstrap::CliContext;

/// List catalog endpoints, optionally probing them first.
pub async fn execute(ctx: &CliContext, probe: bool) -> Result<()> {
    let registry = ctx.catalog_registry().await?;
    if probe {
        registry.check_health().await;
    }
    print_health_table(&registry).await;
    Ok(())
}
