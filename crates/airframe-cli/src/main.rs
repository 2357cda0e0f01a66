//! CLI entry point - the composition root.
//!
//! Logging and environment are set up here; everything else is wired in
//! `bootstrap` and dispatched to `handlers`.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use airframe_cli::{Cli, CliConfig, Commands, bootstrap, handlers};

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = CliConfig::from_cli(&cli)?;
    let ctx = bootstrap(config)?;

    match command {
        Commands::Endpoints { probe } => handlers::endpoints::execute(&ctx, *probe).await?,
        Commands::Probe { name } => handlers::probe::execute(&ctx, name.as_deref()).await?,
        Commands::Infer(args) => handlers::infer::execute(&ctx, args).await?,
        Commands::Watch { dir, key, interval } => {
            handlers::watch::execute(&ctx, dir, key, *interval).await?;
        }
    }

    Ok(())
}
