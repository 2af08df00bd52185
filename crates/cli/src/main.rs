//! `ccbell` -- generate notification sounds for coding-agent hooks.
//!
//! The composition root: loads `.env`, installs tracing, builds the
//! command context and dispatches to a handler.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ccbell_cli::{handlers, Cli, CliContext, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "ccbell=debug" } else { "ccbell=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = CliContext::from_cli(&cli)?;

    match cli.command {
        Commands::Generate(args) => handlers::generate::execute(&ctx, args).await,
        Commands::Library { json } => handlers::library::execute(&ctx, json).await,
        Commands::Remove { sound_id } => handlers::remove::execute(&ctx, sound_id).await,
        Commands::Export { pack_id, out } => handlers::export::execute(&ctx, pack_id, &out).await,
        Commands::Models { model, load } => handlers::models::execute(&ctx, model, load).await,
        Commands::Themes => handlers::catalog::themes(&ctx).await,
        Commands::Hooks => handlers::catalog::hooks(&ctx).await,
    }
}
