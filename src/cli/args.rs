//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Personal knowledge store with versioned documents and fuzzy search
#[derive(Parser, Debug)]
#[command(
    name = "capsuleos",
    version = env!("CARGO_PKG_VERSION"),
    about = "Versioned notes and capsules with fuzzy search",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick start:\n  capsuleos init\n  capsuleos serve\n  capsuleos search \"meeting notes\" --limit 5"
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the settings file and the data folders
    #[command(about = "Set up .capsuleos/settings.toml and the data tree")]
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Run the HTTP API
    #[command(
        about = "Start the HTTP API",
        after_help = "Examples:\n  capsuleos serve\n  capsuleos serve --bind 0.0.0.0:8080 --no-watch"
    )]
    Serve {
        /// Address to listen on (defaults to server.bind)
        #[arg(long)]
        bind: Option<String>,

        /// Do not watch the data tree for external edits
        #[arg(long)]
        no_watch: bool,
    },

    /// Query the search index
    #[command(about = "Fuzzy search across notes and capsules")]
    Search {
        /// Search text
        query: String,

        /// Include documents under archive/
        #[arg(short = 'a', long)]
        include_archived: bool,

        /// Return every version, not only the latest
        #[arg(long)]
        all_versions: bool,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored versions of a capsule
    #[command(about = "List the versions stored for a capsule base name")]
    Versions {
        /// Base filename of the capsule
        base: String,
    },

    /// Restore an old version as the new latest version
    #[command(about = "Copy an old version of a capsule to a new version")]
    Restore {
        /// Base filename of the capsule
        base: String,

        /// Version to restore
        version: u32,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,
}
