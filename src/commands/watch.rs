use anyhow::{Context, Result};
use colored::Colorize;
use sitesync::debounce::{DebounceGate, KeyedDebounceGate, QUIET_WINDOW};
use sitesync::host::Host;
use sitesync::watch::{WatchFilter, WatchSubscription, WatchTrigger, route, same_file};
use sitesync::{Config, Direction, SyncOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{Workspace, build_config};

/// Sync on change until interrupted.
///
/// Ctrl-C kills a running sync; when nothing is running it stops watching.
pub async fn run_watch(workspace: Workspace, host: Host) -> Result<()> {
    let Workspace { source, config } = workspace;
    let root = source.context().root;
    let orchestrator = Arc::new(SyncOrchestrator::new(host.clone()));

    let batch_gate = {
        let orchestrator = orchestrator.clone();
        DebounceGate::new(QUIET_WINDOW, move |config: Arc<Config>| {
            let orchestrator = orchestrator.clone();
            async move {
                orchestrator.run_batch(&config, Direction::Up, false).await;
                orchestrator.sessions().acknowledge();
            }
        })
    };

    let file_gate = {
        let orchestrator = orchestrator.clone();
        KeyedDebounceGate::new(QUIET_WINDOW, move |(config, file): (Arc<Config>, PathBuf)| {
            let orchestrator = orchestrator.clone();
            async move {
                orchestrator.run_single_file(&config, &file, Direction::Up).await;
                orchestrator.sessions().acknowledge();
            }
        })
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
    let mut subscription = WatchSubscription::subscribe(&root, tx.clone())
        .with_context(|| format!("Failed to watch {}", root.display()))?;
    let mut filter = WatchFilter::for_config(&config, &root);
    let mut config = Some(config);

    println!(
        "{} {} {}",
        "Watching".cyan().bold(),
        subscription.root().display(),
        "(Ctrl-C to stop)".dimmed()
    );

    loop {
        tokio::select! {
            changed = rx.recv() => {
                let Some(path) = changed else { break };

                let triggers = match &config {
                    Some(current) => route(current, &filter, &source.path, &path),
                    None if same_file(&path, &source.path) => vec![WatchTrigger::ConfigChanged],
                    None => Vec::new(),
                };

                for trigger in triggers {
                    match trigger {
                        WatchTrigger::ConfigChanged => {
                            match build_config(&source).await {
                                Ok(rebuilt) => {
                                    filter = WatchFilter::for_config(&rebuilt, &root);
                                    config = Some(Arc::new(rebuilt));
                                    subscription = WatchSubscription::subscribe(&root, tx.clone())
                                        .with_context(|| format!("Failed to watch {}", root.display()))?;
                                    println!("{}", "Configuration reloaded".cyan());
                                }
                                Err(e) => {
                                    // No site is usable until the config builds again
                                    config = None;
                                    host.notifier.error(&format!("{e:#}"));
                                }
                            }
                        }
                        WatchTrigger::SaveIndividual(file) => {
                            if let Some(current) = config.clone() {
                                file_gate.trigger(file.clone(), (current, file));
                            }
                        }
                        WatchTrigger::Batch => {
                            if let Some(current) = config.clone() {
                                batch_gate.trigger(current);
                            }
                        }
                    }
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Cannot listen for Ctrl-C")?;
                if !orchestrator.sessions().kill() {
                    break;
                }
                eprintln!("{}", "Killing sync...".yellow());
            }
        }
    }

    drop(subscription);
    Ok(())
}
