//! sitesync CLI
//!
//! Command-line host for mirroring workspace sites with rsync.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sitesync::Direction;
use sitesync::host::{ConsolePicker, Host};

mod commands;

use commands::Workspace;

#[derive(Parser)]
#[command(name = "sitesync")]
#[command(author, version, about = "Mirror local directory trees to remote rsync targets")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory to start looking for sitesync.toml (default: current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workspace folder used for ${workspaceFolder} tokens (default: workspace root)
    #[arg(long, global = true)]
    folder: Option<PathBuf>,

    /// Show sync output from the start
    #[arg(long, global = true)]
    show_output: bool,

    /// Show diagnostic logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload every site
    Up,

    /// Download every site
    Down,

    /// Upload one site, picked interactively unless given
    UpSingle {
        /// Site name (or remote path for unnamed sites)
        site: Option<String>,
    },

    /// Download one site, picked interactively unless given
    DownSingle {
        /// Site name (or remote path for unnamed sites)
        site: Option<String>,
    },

    /// Show what an upload would change
    CompareUp,

    /// Show what a download would change
    CompareDown,

    /// Upload a single file to every site containing it
    UpFile {
        file: PathBuf,
    },

    /// Download a single file from every site containing it
    DownFile {
        file: PathBuf,
    },

    /// Sync on change according to onSave, onSaveIndividual and watchGlobs
    Watch,

    /// List the resolved sites
    Sites {
        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = sitesync::logging::init(cli.verbose) {
        eprintln!("Failed to initialise logging: {e}");
    }

    let workspace = Workspace::open(cli.path, cli.config, cli.folder).await?;
    let host = Host::console(cli.show_output);

    let success = match cli.command {
        Commands::Up => commands::sync::run_batch(&workspace, host, Direction::Up, false).await?,
        Commands::Down => {
            commands::sync::run_batch(&workspace, host, Direction::Down, false).await?
        }
        Commands::UpSingle { site } => {
            commands::sync::run_single_site(&workspace, host, Direction::Up, site, &ConsolePicker)
                .await?
        }
        Commands::DownSingle { site } => {
            commands::sync::run_single_site(
                &workspace,
                host,
                Direction::Down,
                site,
                &ConsolePicker,
            )
            .await?
        }
        Commands::CompareUp => {
            commands::sync::run_batch(&workspace, host, Direction::Up, true).await?
        }
        Commands::CompareDown => {
            commands::sync::run_batch(&workspace, host, Direction::Down, true).await?
        }
        Commands::UpFile { file } => {
            commands::sync::run_file(&workspace, host, &file, Direction::Up).await?
        }
        Commands::DownFile { file } => {
            commands::sync::run_file(&workspace, host, &file, Direction::Down).await?
        }
        Commands::Watch => {
            commands::watch::run_watch(workspace, host).await?;
            true
        }
        Commands::Sites { json } => {
            commands::sites::run_sites(&workspace, json)?;
            true
        }
    };

    if !success {
        std::process::exit(1);
    }

    Ok(())
}
