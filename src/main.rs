use clap::Parser;

use capsuleos::Settings;
use capsuleos::cli::commands::{init, search, serve, versions};
use capsuleos::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;

    capsuleos::logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Init { force } => init::run_init(&settings, force),
        Commands::Config => init::run_config(&settings),
        Commands::Serve { bind, no_watch } => {
            serve::run(settings, serve::ServeArgs { bind, no_watch }).await
        }
        Commands::Search {
            query,
            include_archived,
            all_versions,
            limit,
            json,
        } => search::run(
            &settings,
            search::SearchArgs {
                query,
                include_archived,
                all_versions,
                limit,
                json,
            },
        ),
        Commands::Versions { base } => versions::run_versions(&settings, &base),
        Commands::Restore { base, version } => versions::run_restore(&settings, &base, version),
    }
}
