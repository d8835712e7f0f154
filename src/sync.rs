//! Multi-site sync orchestration
//!
//! Runs the sync tool for each site of a configuration in order, one site at
//! a time. A failing site is reported and the run moves on; skipped sites do
//! not count against the result. Killing the run's session stops it before
//! the next site.

use std::fmt;
use std::path::{Component, Path};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, Site};
use crate::host::Host;
use crate::process::ProcessRunner;
use crate::session::{SessionState, SessionTracker, SyncSession};

/// Exit code tolerated for single-file runs: the file went away before the
/// sync tool got to it.
pub const VANISHED_SOURCE_CODE: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Up => "up",
            Direction::Down => "down",
        })
    }
}

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("{executable} exited with code {code}")]
    SyncExit { executable: String, code: i32 },
    #[error("after-sync command {command} exited with code {code}")]
    PostSyncCommand { command: String, code: i32 },
}

/// Why a site was not attempted; never a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UpOnly,
    DownOnly,
    MissingLocalPath(String),
    OutsideSite,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpOnly => f.write_str("site is up only"),
            SkipReason::DownOnly => f.write_str("site is down only"),
            SkipReason::MissingLocalPath(path) => write!(f, "local path {path} does not exist"),
            SkipReason::OutsideSite => f.write_str("file is outside the site"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteOutcome {
    Synced,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy)]
enum Mode<'a> {
    Sites { dry_run: bool },
    File(&'a Path),
}

impl Mode<'_> {
    fn dry_run(&self) -> bool {
        matches!(self, Mode::Sites { dry_run: true })
    }
}

// =============================================================================
// Arguments
// =============================================================================

/// Local and remote ends of one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub local: String,
    pub remote: String,
}

impl Endpoints {
    pub fn for_site(site: &Site) -> Self {
        Self {
            local: site.translated_local_path.clone(),
            remote: site.remote_path.clone(),
        }
    }

    /// Endpoints narrowed to one file, or `None` if it lies outside the site
    pub fn for_file(site: &Site, file: &Path) -> Option<Self> {
        let relative = file.strip_prefix(&site.local_path).ok()?;
        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let local_sep = if site.translated_local_path.ends_with('\\') {
            "\\"
        } else {
            "/"
        };
        Some(Self {
            local: format!("{}{}", site.translated_local_path, parts.join(local_sep)),
            remote: format!("{}{}", site.remote_path, parts.join("/")),
        })
    }
}

/// Build the sync tool's argument list for one site
pub fn build_args(
    site: &Site,
    direction: Direction,
    dry_run: bool,
    endpoints: &Endpoints,
) -> Vec<String> {
    let mut args = Vec::new();

    if !site.flags.is_empty() {
        args.push(format!("-{}", site.flags));
    }
    for group in &site.options {
        args.extend(group.iter().cloned());
    }
    args.extend(site.include.iter().map(|p| format!("--include={p}")));
    args.extend(site.exclude.iter().map(|p| format!("--exclude={p}")));
    if let Some(shell) = &site.shell {
        args.push("-e".to_string());
        args.push(shell.clone());
    }
    if site.delete_files {
        args.push("--delete".to_string());
    }
    if let Some(chmod) = &site.chmod {
        args.push(format!("--chmod={chmod}"));
    }
    if dry_run {
        args.push("--dry-run".to_string());
    }
    args.extend(site.args.iter().cloned());

    match direction {
        Direction::Up => {
            args.push(endpoints.local.clone());
            args.push(endpoints.remote.clone());
        }
        Direction::Down => {
            args.push(endpoints.remote.clone());
            args.push(endpoints.local.clone());
        }
    }
    args
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct SyncOrchestrator {
    host: Host,
    sessions: Arc<SessionTracker>,
}

impl SyncOrchestrator {
    pub fn new(host: Host) -> Self {
        let sessions = Arc::new(SessionTracker::new(host.status.clone()));
        Self { host, sessions }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn sessions(&self) -> &Arc<SessionTracker> {
        &self.sessions
    }

    /// Sync every site in one direction
    pub async fn run_batch(&self, config: &Config, direction: Direction, dry_run: bool) -> bool {
        let sites: Vec<&Site> = config.sites.iter().collect();
        self.run(config, &sites, direction, Mode::Sites { dry_run })
            .await
    }

    /// Sync one file across every site it belongs to
    pub async fn run_single_file(&self, config: &Config, file: &Path, direction: Direction) -> bool {
        let sites: Vec<&Site> = config.sites.iter().collect();
        self.run(config, &sites, direction, Mode::File(file)).await
    }

    /// Sync a single, usually hand-picked, site
    pub async fn run_one(
        &self,
        config: &Config,
        site: &Site,
        direction: Direction,
        dry_run: bool,
    ) -> bool {
        self.run(config, &[site], direction, Mode::Sites { dry_run })
            .await
    }

    async fn run(&self, config: &Config, sites: &[&Site], direction: Direction, mode: Mode<'_>) -> bool {
        let session = self.sessions.start();
        let output = &self.host.output;

        let label = match mode {
            Mode::Sites { dry_run: true } => format!("comparing {direction}"),
            Mode::Sites { dry_run: false } => format!("syncing {direction}"),
            Mode::File(file) => format!("syncing {direction} {}", file.display()),
        };
        output.append_line(&format!(
            "\n{} {label}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        if config.auto_show_output {
            output.show();
        }

        let runner = ProcessRunner::new(output.clone(), config.use_wsl);
        let mut success = true;

        for site in sites {
            if session.is_cancelled() {
                output.append_line("Sync killed, remaining sites skipped");
                break;
            }
            if config.show_progress {
                self.host.status.progress(site.key());
            }

            match self.sync_site(&runner, &session, site, direction, mode).await {
                Ok(SiteOutcome::Synced) => {}
                Ok(SiteOutcome::Skipped(reason)) => {
                    tracing::debug!(site = %site.key(), %reason, "Skipping site");
                    output.append_line(&format!("Skipping {}: {reason}", site.key()));
                }
                Err(e) => {
                    tracing::warn!(site = %site.key(), error = %e, "Site sync failed");
                    let message = format!("Sync {direction} of {} failed: {e}", site.key());
                    output.append_line(&message);
                    self.host.notifier.error(&message);
                    success = false;
                }
            }
        }

        match self.sessions.finish(&session, success) {
            SessionState::Succeeded => {
                if config.notification {
                    self.host.notifier.info(&format!("Sync {direction} complete"));
                }
                if config.auto_hide_output {
                    output.hide();
                }
                true
            }
            SessionState::Cancelled => {
                output.append_line("Sync killed");
                false
            }
            _ => {
                if config.auto_show_output_on_error {
                    output.show();
                }
                false
            }
        }
    }

    async fn sync_site(
        &self,
        runner: &ProcessRunner,
        session: &SyncSession,
        site: &Site,
        direction: Direction,
        mode: Mode<'_>,
    ) -> Result<SiteOutcome, SiteError> {
        if direction == Direction::Down && site.up_only {
            return Ok(SiteOutcome::Skipped(SkipReason::UpOnly));
        }
        if direction == Direction::Up && site.down_only {
            return Ok(SiteOutcome::Skipped(SkipReason::DownOnly));
        }
        if !tokio::fs::try_exists(&site.local_path).await.unwrap_or(false) {
            return Ok(SiteOutcome::Skipped(SkipReason::MissingLocalPath(
                site.local_path.clone(),
            )));
        }

        let endpoints = match mode {
            Mode::Sites { .. } => Endpoints::for_site(site),
            Mode::File(file) => match Endpoints::for_file(site, file) {
                Some(endpoints) => endpoints,
                None => return Ok(SiteOutcome::Skipped(SkipReason::OutsideSite)),
            },
        };

        let args = build_args(site, direction, mode.dry_run(), &endpoints);
        let shell = site.executable_shell.as_deref();
        let code = runner
            .run(&site.executable, &args, shell, session.token())
            .await;

        if code != 0 {
            let tolerated = matches!(mode, Mode::File(_)) && code == VANISHED_SOURCE_CODE;
            if !tolerated {
                return Err(SiteError::SyncExit {
                    executable: site.executable.clone(),
                    code,
                });
            }
            self.host
                .output
                .append_line(&format!("{} no longer exists, nothing to sync", endpoints.local));
        }

        if direction == Direction::Up
            && !mode.dry_run()
            && let Some((command, command_args)) = site.after_sync.split_first()
        {
            let code = runner
                .run(command, command_args, shell, session.token())
                .await;
            if code != 0 {
                return Err(SiteError::PostSyncCommand {
                    command: command.clone(),
                    code,
                });
            }
        }

        Ok(SiteOutcome::Synced)
    }
}
