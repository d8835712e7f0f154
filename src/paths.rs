//! Local path translation for the sync tool
//!
//! On hosts where rsync runs inside a POSIX layer (Cygwin, MSYS, WSL) the
//! local side of a transfer has to be spelled the way that layer expects.
//! A configured bridge executable does the rewriting; everything here is
//! blocking and only runs while a configuration is being built.

use std::process::Command;
use thiserror::Error;

/// Command used to reach the WSL path bridge
pub const WSL_BRIDGE: &str = "wsl";

/// Root marker of paths already in the sync tool's own syntax
const SYNC_ROOT: char = '/';

#[derive(Debug, Error)]
pub enum PathTranslationError {
    #[error("Failed to run path bridge {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Path bridge {program} failed for {path} ({status}): {stderr}")]
    Exit {
        program: String,
        path: String,
        status: String,
        stderr: String,
    },
}

/// Which bridge, if any, rewrites local paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathBridge {
    None,
    /// A cygpath-style executable taking the path as its only argument
    Executable(String),
    /// `wsl wslpath`
    Wsl,
}

#[derive(Debug, Clone)]
pub struct PathTranslator {
    bridge: PathBridge,
}

impl PathTranslator {
    /// Select the bridge. An explicit executable wins over WSL.
    pub fn new(cygpath: Option<&str>, use_wsl: bool) -> Self {
        let bridge = match cygpath {
            Some(program) if !program.trim().is_empty() => {
                PathBridge::Executable(program.to_string())
            }
            _ if use_wsl => PathBridge::Wsl,
            _ => PathBridge::None,
        };
        Self { bridge }
    }

    pub fn bridge(&self) -> &PathBridge {
        &self.bridge
    }

    /// Rewrite a local path into the sync tool's syntax
    pub fn translate(&self, path: Option<&str>) -> Result<Option<String>, PathTranslationError> {
        path.map(|p| self.translate_path(p)).transpose()
    }

    pub fn translate_path(&self, path: &str) -> Result<String, PathTranslationError> {
        if path.starts_with(SYNC_ROOT) {
            return Ok(path.to_string());
        }

        match &self.bridge {
            PathBridge::Executable(program) => run_bridge(program, &[path]),
            PathBridge::Wsl => {
                let escaped = escape_for_wsl(path);
                run_bridge(WSL_BRIDGE, &["wslpath", "-a", &escaped])
            }
            PathBridge::None => Ok(path.to_string()),
        }
    }

    /// Reverse of [`translate`](Self::translate); only the executable bridge
    /// knows how to go back.
    pub fn untranslate(&self, path: Option<&str>) -> Result<Option<String>, PathTranslationError> {
        let Some(path) = path else {
            return Ok(None);
        };
        match &self.bridge {
            PathBridge::Executable(program) => run_bridge(program, &["-w", path]).map(Some),
            _ => Ok(Some(path.to_string())),
        }
    }
}

/// Backslashes survive the trip through the WSL command line only when doubled
pub fn escape_for_wsl(path: &str) -> String {
    path.replace('\\', "\\\\")
}

fn run_bridge(program: &str, args: &[&str]) -> Result<String, PathTranslationError> {
    tracing::debug!(%program, ?args, "Translating path");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| PathTranslationError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(PathTranslationError::Exit {
            program: program.to_string(),
            path: args.last().copied().unwrap_or_default().to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_bridge_is_identity() {
        let translator = PathTranslator::new(None, false);
        for p in ["C:\\work\\site", "relative/dir", "/abs/dir/", ""] {
            assert_eq!(translator.translate(Some(p)).unwrap().as_deref(), Some(p));
            assert_eq!(translator.untranslate(Some(p)).unwrap().as_deref(), Some(p));
        }
        assert_eq!(translator.translate(None).unwrap(), None);
    }

    #[test]
    fn test_bridge_selection_precedence() {
        assert_eq!(
            PathTranslator::new(Some("cygpath"), true).bridge(),
            &PathBridge::Executable("cygpath".into())
        );
        assert_eq!(PathTranslator::new(None, true).bridge(), &PathBridge::Wsl);
        assert_eq!(PathTranslator::new(Some("  "), false).bridge(), &PathBridge::None);
    }

    #[test]
    fn test_sync_syntax_paths_skip_the_bridge() {
        // Would fail to spawn if it were consulted
        let translator = PathTranslator::new(Some("/nonexistent/cygpath"), false);
        assert_eq!(
            translator.translate(Some("/cygdrive/c/work")).unwrap().as_deref(),
            Some("/cygdrive/c/work")
        );
        assert_eq!(translator.translate(None).unwrap(), None);
    }

    #[test]
    fn test_missing_bridge_is_a_spawn_error() {
        let translator = PathTranslator::new(Some("/nonexistent/cygpath"), false);
        let err = translator.translate(Some("C:\\work")).unwrap_err();
        assert!(matches!(err, PathTranslationError::Spawn { .. }));
    }

    #[test]
    fn test_escape_for_wsl() {
        assert_eq!(escape_for_wsl("C:\\work\\site"), "C:\\\\work\\\\site");
        assert_eq!(escape_for_wsl("plain"), "plain");
    }

    #[cfg(unix)]
    mod bridge_scripts {
        use super::super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn script(dir: &TempDir, body: &str) -> String {
            let path = dir.path().join("bridge.sh");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        #[test]
        fn test_bridge_output_is_trimmed() {
            let dir = TempDir::new().unwrap();
            let bridge = script(&dir, r#"if [ "$1" = "-w" ]; then printf 'W:%s\n' "$2"; else printf '  /cygdrive/%s  \n' "$1"; fi"#);
            let translator = PathTranslator::new(Some(&bridge), false);

            assert_eq!(
                translator.translate(Some("c/work")).unwrap().as_deref(),
                Some("/cygdrive/c/work")
            );
            assert_eq!(
                translator.untranslate(Some("/cygdrive/c/work")).unwrap().as_deref(),
                Some("W:/cygdrive/c/work")
            );
        }

        #[test]
        fn test_bridge_failure_is_an_exit_error() {
            let dir = TempDir::new().unwrap();
            let bridge = script(&dir, "echo nope >&2; exit 2");
            let translator = PathTranslator::new(Some(&bridge), false);

            match translator.translate(Some("c:\\work")) {
                Err(PathTranslationError::Exit { stderr, path, .. }) => {
                    assert_eq!(stderr, "nope");
                    assert_eq!(path, "c:\\work");
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }
}
