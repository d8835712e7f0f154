//! External command execution
//!
//! Spawns the sync tool (or an after-sync command), streams its output to the
//! log sink as it arrives and resolves to an exit code. Launch strategy
//! depends on the platform: Windows hosts need the command line re-framed for
//! a wrapping shell or for the WSL bridge.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::host::OutputSink;
use crate::paths::WSL_BRIDGE;

/// Exit code reported when a command could not be started
pub const SPAWN_FAILURE_CODE: i32 = 1;

/// Exit code reported when a command ended without one (killed by a signal)
pub const NO_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    fn requires_wrapping(self) -> bool {
        self == Platform::Windows
    }
}

/// The program actually spawned and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Decide how `executable args...` is launched.
    ///
    /// On Windows a shell override receives the whole command line quoted as
    /// a single `-c` argument; without one, an enabled WSL bridge runs the
    /// executable inside WSL. Elsewhere the shell override runs the command
    /// line as a POSIX shell script and no override means a direct spawn.
    pub fn plan(
        executable: &str,
        args: &[String],
        shell: Option<&str>,
        use_wsl: bool,
        platform: Platform,
    ) -> Self {
        match shell {
            Some(shell) if platform.requires_wrapping() => Invocation {
                program: shell.to_string(),
                args: vec!["-c".to_string(), double_quoted_command(executable, args)],
            },
            None if use_wsl && platform.requires_wrapping() => Invocation {
                program: WSL_BRIDGE.to_string(),
                args: std::iter::once(executable.to_string())
                    .chain(args.iter().cloned())
                    .collect(),
            },
            Some(shell) => Invocation {
                program: shell.to_string(),
                args: vec!["-c".to_string(), posix_command(executable, args)],
            },
            None => Invocation {
                program: executable.to_string(),
                args: args.to_vec(),
            },
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn double_quoted_command(executable: &str, args: &[String]) -> String {
    std::iter::once(executable)
        .chain(args.iter().map(String::as_str))
        .map(|part| format!("\"{}\"", part.replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn posix_command(executable: &str, args: &[String]) -> String {
    std::iter::once(executable)
        .chain(args.iter().map(String::as_str))
        .map(posix_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

fn posix_quote(part: &str) -> String {
    let plain = !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain {
        part.to_string()
    } else {
        format!("'{}'", part.replace('\'', r"'\''"))
    }
}

/// Runs commands and streams their output to a log sink
#[derive(Clone)]
pub struct ProcessRunner {
    output: Arc<dyn OutputSink>,
    use_wsl: bool,
    platform: Platform,
}

impl ProcessRunner {
    pub fn new(output: Arc<dyn OutputSink>, use_wsl: bool) -> Self {
        Self {
            output,
            use_wsl,
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Run a command to completion and return its exit code.
    ///
    /// A spawn failure is logged and reported as [`SPAWN_FAILURE_CODE`].
    /// Cancelling `cancel` kills the process.
    pub async fn run(
        &self,
        executable: &str,
        args: &[String],
        shell: Option<&str>,
        cancel: &CancellationToken,
    ) -> i32 {
        let invocation = Invocation::plan(executable, args, shell, self.use_wsl, self.platform);
        self.output.append_line(&format!("> {invocation}"));

        match self.spawn_and_stream(&invocation, cancel).await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(program = %invocation.program, error = %e, "Failed to start command");
                self.output
                    .append_line(&format!("Failed to start {}: {e}", invocation.program));
                SPAWN_FAILURE_CODE
            }
        }
    }

    async fn spawn_and_stream(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> std::io::Result<i32> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a kill also reaches whatever a wrapping shell started
        #[cfg(unix)]
        {
            command.process_group(0);
        }
        let mut child = command.spawn()?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out_buf = [0u8; 4096];
        let mut err_buf = [0u8; 4096];
        let mut killed = false;

        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                _ = cancel.cancelled(), if !killed => {
                    killed = true;
                    self.output.append_line("Killing process");
                    if let Err(e) = kill_tree(&mut child) {
                        tracing::warn!(error = %e, "Failed to kill process");
                    }
                    // Stray descendants may hold the pipes open; stop draining
                    stdout = None;
                    stderr = None;
                }
                read = read_chunk(&mut stdout, &mut out_buf) => {
                    match read {
                        Ok(0) | Err(_) => stdout = None,
                        Ok(n) => self.output.append(&String::from_utf8_lossy(&out_buf[..n])),
                    }
                }
                read = read_chunk(&mut stderr, &mut err_buf) => {
                    match read {
                        Ok(0) | Err(_) => stderr = None,
                        Ok(n) => self.output.append(&String::from_utf8_lossy(&err_buf[..n])),
                    }
                }
            }
        }

        if cancel.is_cancelled() && !killed {
            kill_tree(&mut child).ok();
        }

        let status = child.wait().await?;
        tracing::debug!(program = %invocation.program, %status, "Command finished");
        Ok(status.code().unwrap_or(NO_EXIT_CODE))
    }
}

/// Kill the child together with its process group
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: plain syscall on the group this child leads
            if unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) } == 0 {
                return Ok(());
            }
            let error = std::io::Error::last_os_error();
            tracing::debug!(%error, "killpg failed, killing child only");
        }
    }
    child.start_kill()
}

async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}
