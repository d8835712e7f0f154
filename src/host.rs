//! Host collaborators
//!
//! The orchestration core only talks to its surroundings through these
//! narrow traits: an output log, user notifications, a status indicator and
//! an interactive site picker. The console implementations back the CLI.

use anyhow::Result;
use colored::Colorize;
use is_terminal::IsTerminal;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use crate::session::SessionState;

/// Log surface that receives command lines and raw sync-tool output
pub trait OutputSink: Send + Sync {
    fn append(&self, text: &str);

    fn append_line(&self, line: &str) {
        self.append(&format!("{line}\n"));
    }

    fn show(&self);
    fn hide(&self);
}

/// User-visible messages
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Visible run status
pub trait StatusIndicator: Send + Sync {
    fn set_state(&self, state: SessionState);
    fn progress(&self, label: &str);
}

/// Interactive choice among registry keys
pub trait SitePicker {
    fn pick(&self, prompt: &str, keys: &[String]) -> Result<Option<String>>;
}

/// The collaborators a sync run reports to
#[derive(Clone)]
pub struct Host {
    pub output: Arc<dyn OutputSink>,
    pub notifier: Arc<dyn Notifier>,
    pub status: Arc<dyn StatusIndicator>,
}

impl Host {
    pub fn console(show_output: bool) -> Self {
        Self {
            output: Arc::new(ConsoleOutput::new(show_output)),
            notifier: Arc::new(ConsoleNotifier),
            status: Arc::new(ConsoleStatus),
        }
    }
}

// =============================================================================
// Console implementations
// =============================================================================

#[derive(Debug, Default)]
struct OutputState {
    visible: bool,
    buffer: String,
}

/// Buffers everything; echoes to stdout while visible
#[derive(Debug, Default)]
pub struct ConsoleOutput {
    state: Mutex<OutputState>,
}

impl ConsoleOutput {
    pub fn new(visible: bool) -> Self {
        Self {
            state: Mutex::new(OutputState {
                visible,
                buffer: String::new(),
            }),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .visible
    }

    pub fn contents(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .buffer
            .clone()
    }
}

impl OutputSink for ConsoleOutput {
    fn append(&self, text: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.buffer.push_str(text);
        if state.visible {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    }

    fn show(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.visible {
            state.visible = true;
            print!("{}", state.buffer);
            let _ = std::io::stdout().flush();
        }
    }

    fn hide(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .visible = false;
    }
}

pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn info(&self, message: &str) {
        println!("{} {}", "✔".green(), message);
    }

    fn error(&self, message: &str) {
        eprintln!("{} {}", "✘".red(), message);
    }
}

pub struct ConsoleStatus;

impl StatusIndicator for ConsoleStatus {
    fn set_state(&self, state: SessionState) {
        let line = match state {
            SessionState::Idle => return,
            SessionState::Running => "⟳ Syncing".cyan(),
            SessionState::Succeeded => "✔ Sync complete".green(),
            SessionState::Failed => "✘ Sync failed".red().bold(),
            SessionState::Cancelled => "■ Sync killed".yellow(),
        };
        eprintln!("{line}");
    }

    fn progress(&self, label: &str) {
        eprintln!("  {} {}", "➤".cyan(), label.dimmed());
    }
}

pub struct ConsolePicker;

impl SitePicker for ConsolePicker {
    fn pick(&self, prompt: &str, keys: &[String]) -> Result<Option<String>> {
        use dialoguer::{Select, theme::ColorfulTheme};

        if !std::io::stdin().is_terminal() {
            anyhow::bail!("No site given and stdin is not a terminal to pick one");
        }

        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(keys)
            .default(0)
            .interact_opt()?;

        Ok(choice.map(|idx| keys[idx].clone()))
    }
}
