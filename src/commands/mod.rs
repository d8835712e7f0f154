//! CLI commands

pub mod sites;
#[cfg(test)]
mod sites_tests;
pub mod sync;
pub mod watch;

use anyhow::{Context, Result};
use sitesync::{Config, ConfigSource};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// A resolved workspace, ready to sync
pub struct Workspace {
    pub source: ConfigSource,
    pub config: Arc<Config>,
}

impl Workspace {
    pub async fn open(
        path: Option<PathBuf>,
        config: Option<PathBuf>,
        folder: Option<PathBuf>,
    ) -> Result<Self> {
        let start_dir = match path {
            Some(p) => std::path::absolute(&p)
                .with_context(|| format!("Failed to resolve {}", p.display()))?,
            None => env::current_dir().context("Failed to read current directory")?,
        };

        // The workspace root is derived from the config path, so it must be absolute
        let config_path = match config {
            Some(p) => std::path::absolute(&p)
                .with_context(|| format!("Failed to resolve {}", p.display()))?,
            None => Config::find_config(&start_dir)?,
        };
        tracing::debug!(config = %config_path.display(), "Using config");

        let source = ConfigSource::new(config_path, folder);
        let config = build_config(&source).await?;
        Ok(Self {
            source,
            config: Arc::new(config),
        })
    }
}

/// Resolve a configuration off the async thread; bridge executables block.
pub async fn build_config(source: &ConfigSource) -> Result<Config> {
    let source = source.clone();
    let config = tokio::task::spawn_blocking(move || source.build())
        .await
        .context("Configuration task failed")??;
    Ok(config)
}
