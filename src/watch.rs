//! Filesystem watching
//!
//! A [`WatchSubscription`] owns the underlying `notify` watcher; dropping it
//! releases the watch. Watch mode rebuilds the subscription together with the
//! configuration whenever the config file changes. [`route`] decides what a
//! changed path should trigger.

use glob::{MatchOptions, Pattern};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::Config;

/// Live filesystem watch feeding changed paths into a channel
pub struct WatchSubscription {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl WatchSubscription {
    pub fn subscribe(root: &Path, tx: UnboundedSender<PathBuf>) -> notify::Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_change(&event.kind) => {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Watch error"),
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), "Watching workspace");

        Ok(Self {
            root: root.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Which changed paths matter, and to whom
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    globs: Vec<Pattern>,
    ignored: Vec<String>,
}

impl WatchFilter {
    pub fn new(root: &Path, globs: &[String], ignored: &[String]) -> Self {
        let globs = globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(%glob, error = %e, "Ignoring invalid watch glob");
                    None
                }
            })
            .collect();

        Self {
            root: root.to_path_buf(),
            globs,
            ignored: ignored.to_vec(),
        }
    }

    /// Filter for a configuration: its watch globs, ignoring whatever the
    /// first site excludes by plain name.
    pub fn for_config(config: &Config, root: &Path) -> Self {
        let ignored: Vec<String> = config
            .sites
            .first()
            .map(|site| {
                site.exclude
                    .iter()
                    .filter(|p| !p.contains(['*', '?', '[', '/']))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Self::new(root, &config.watch_globs, &ignored)
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.relative(path)
            .components()
            .any(|c| self.ignored.iter().any(|name| c.as_os_str() == name.as_str()))
    }

    pub fn matches_globs(&self, path: &Path) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        let relative = self.relative(path);
        self.globs
            .iter()
            .any(|glob| glob.matches_path_with(relative, options))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTrigger {
    /// The config file changed; rebuild everything
    ConfigChanged,
    /// Upload just this file
    SaveIndividual(PathBuf),
    /// Debounced upload of every site
    Batch,
}

/// Decide what a changed path triggers
pub fn route(config: &Config, filter: &WatchFilter, config_path: &Path, path: &Path) -> Vec<WatchTrigger> {
    if same_file(path, config_path) {
        return vec![WatchTrigger::ConfigChanged];
    }
    // Directory events say nothing a file event will not say again
    if filter.is_ignored(path) || path.is_dir() {
        return Vec::new();
    }

    let mut triggers = Vec::new();
    if config.on_save_individual {
        triggers.push(WatchTrigger::SaveIndividual(path.to_path_buf()));
    } else if config.on_save {
        triggers.push(WatchTrigger::Batch);
    }
    if filter.matches_globs(path) && !triggers.contains(&WatchTrigger::Batch) {
        triggers.push(WatchTrigger::Batch);
    }
    triggers
}

/// Same file, however each path is spelled
pub fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawSettings;
    use crate::templating::WorkspaceContext;

    fn config(toml: &str) -> Config {
        let raw: RawSettings = toml::from_str(toml).unwrap();
        Config::build(&raw, &WorkspaceContext::new("/w")).unwrap()
    }

    #[test]
    fn test_globs_match_relative_to_root() {
        let filter = WatchFilter::new(
            Path::new("/w"),
            &["src/**/*.php".into(), "*.css".into(), "[bad".into()],
            &[],
        );

        assert!(filter.matches_globs(Path::new("/w/src/a/b.php")));
        assert!(filter.matches_globs(Path::new("/w/src/b.php")));
        assert!(filter.matches_globs(Path::new("/w/theme/site.css")));
        assert!(!filter.matches_globs(Path::new("/w/lib/b.php")));
    }

    #[test]
    fn test_excluded_names_are_ignored() {
        let cfg = config(r#"remote = "h:/s""#);
        let filter = WatchFilter::for_config(&cfg, Path::new("/w"));

        assert!(filter.is_ignored(Path::new("/w/.git/index")));
        assert!(filter.is_ignored(Path::new("/w/.vscode/settings.json")));
        assert!(!filter.is_ignored(Path::new("/w/src/.gitkeep")));
    }

    #[test]
    fn test_route_config_change() {
        let cfg = config(r#"remote = "h:/s""#);
        let filter = WatchFilter::for_config(&cfg, Path::new("/w"));
        let config_path = Path::new("/w/sitesync.toml");

        assert_eq!(
            route(&cfg, &filter, config_path, config_path),
            [WatchTrigger::ConfigChanged]
        );
    }

    #[test]
    fn test_route_on_save_modes() {
        let config_path = Path::new("/w/sitesync.toml");
        let file = Path::new("/w/src/main.php");

        let batch = config(r#"onSave = true
remote = "h:/s""#);
        let filter = WatchFilter::for_config(&batch, Path::new("/w"));
        assert_eq!(route(&batch, &filter, config_path, file), [WatchTrigger::Batch]);

        let individual = config(r#"onSave = true
onSaveIndividual = true
remote = "h:/s""#);
        assert_eq!(
            route(&individual, &filter, config_path, file),
            [WatchTrigger::SaveIndividual(file.to_path_buf())]
        );

        let quiet = config(r#"remote = "h:/s""#);
        assert!(route(&quiet, &filter, config_path, file).is_empty());
        assert!(route(&batch, &filter, config_path, Path::new("/w/.git/HEAD")).is_empty());
    }

    #[test]
    fn test_route_watch_globs() {
        let cfg = config(r#"watchGlobs = ["**/*.php"]
remote = "h:/s""#);
        let filter = WatchFilter::for_config(&cfg, Path::new("/w"));
        let config_path = Path::new("/w/sitesync.toml");

        assert_eq!(
            route(&cfg, &filter, config_path, Path::new("/w/a/b.php")),
            [WatchTrigger::Batch]
        );
        assert!(route(&cfg, &filter, config_path, Path::new("/w/a/b.txt")).is_empty());
    }

    #[test]
    fn test_route_skips_directories() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dir = temp_dir.path().join("assets");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("app.js");
        std::fs::write(&file, "").unwrap();

        let raw: RawSettings = toml::from_str(
            r#"onSaveIndividual = true
remote = "h:/s""#,
        )
        .unwrap();
        let cfg = Config::build(&raw, &WorkspaceContext::new(temp_dir.path())).unwrap();
        let filter = WatchFilter::for_config(&cfg, temp_dir.path());
        let config_path = temp_dir.path().join("sitesync.toml");

        assert!(route(&cfg, &filter, &config_path, &dir).is_empty());
        assert_eq!(
            route(&cfg, &filter, &config_path, &file),
            [WatchTrigger::SaveIndividual(file.clone())]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_same_file_sees_through_symlinks() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        std::fs::create_dir_all(&real).unwrap();
        std::fs::write(real.join("sitesync.toml"), "").unwrap();
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(same_file(&link.join("sitesync.toml"), &real.join("sitesync.toml")));
        assert!(!same_file(&real.join("sitesync.toml"), &real.join("other.toml")));
    }
}
