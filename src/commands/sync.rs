use anyhow::Result;
use colored::Colorize;
use sitesync::host::{Host, SitePicker};
use sitesync::{Direction, SyncOrchestrator};
use std::future::Future;
use std::path::Path;

use super::Workspace;

/// sync-up, sync-down, compare-up, compare-down
pub async fn run_batch(
    workspace: &Workspace,
    host: Host,
    direction: Direction,
    dry_run: bool,
) -> Result<bool> {
    let orchestrator = SyncOrchestrator::new(host);
    let run = orchestrator.run_batch(&workspace.config, direction, dry_run);
    Ok(with_kill_switch(&orchestrator, run).await)
}

/// sync-up-single, sync-down-single
pub async fn run_single_site(
    workspace: &Workspace,
    host: Host,
    direction: Direction,
    site: Option<String>,
    picker: &dyn SitePicker,
) -> Result<bool> {
    let registry = &workspace.config.registry;
    let key = match site {
        Some(key) => Some(key),
        None => picker.pick(&format!("Site to sync {direction}"), registry.keys())?,
    };
    let Some(key) = key else {
        return Ok(true);
    };
    let Some(site) = registry.get(&key) else {
        println!("{} No site named {}", "!".yellow(), key.bold());
        return Ok(true);
    };

    let orchestrator = SyncOrchestrator::new(host);
    let run = orchestrator.run_one(&workspace.config, site, direction, false);
    Ok(with_kill_switch(&orchestrator, run).await)
}

/// sync-up-for-file, sync-down-for-file
pub async fn run_file(
    workspace: &Workspace,
    host: Host,
    file: &Path,
    direction: Direction,
) -> Result<bool> {
    let file = std::path::absolute(file)?;
    let orchestrator = SyncOrchestrator::new(host);
    let run = orchestrator.run_single_file(&workspace.config, &file, direction);
    Ok(with_kill_switch(&orchestrator, run).await)
}

/// Await a run; Ctrl-C kills it (kill-sync) instead of the process.
pub async fn with_kill_switch<F>(orchestrator: &SyncOrchestrator, run: F) -> bool
where
    F: Future<Output = bool>,
{
    tokio::pin!(run);
    loop {
        tokio::select! {
            success = &mut run => {
                orchestrator.sessions().acknowledge();
                return success;
            }
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    if orchestrator.sessions().kill() {
                        eprintln!("{}", "Killing sync...".yellow());
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
                    let success = run.await;
                    orchestrator.sessions().acknowledge();
                    return success;
                }
            },
        }
    }
}
