//! Configuration parsing and resolution for sitesync
//!
//! Raw settings come from a TOML file. Per-site keys written at the top level
//! form the default site; each `[[sites]]` table overrides it field by field.
//! [`Config::build`] turns the raw settings into fully resolved, path-correct
//! sites. A built `Config` is never mutated; a settings change builds a new
//! one.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::paths::{PathTranslationError, PathTranslator};
use crate::registry::SiteRegistry;
use crate::templating::{WorkspaceContext, substitute};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "sitesync.toml";

/// Directory that may hold the configuration file
pub const DEFAULT_CONFIG_DIR: &str = ".sitesync";

/// Archive-style transfer flags used when none are configured
pub const DEFAULT_FLAGS: &str = "rlptzv";

/// Sync tool used when none is configured
pub const DEFAULT_EXECUTABLE: &str = "rsync";

/// Patterns excluded when no `exclude` list is configured
pub const DEFAULT_EXCLUDE: &[&str] = &[".git", ".vscode"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Could not find sitesync.toml in {start} or any parent directory")]
    NotFound { start: PathBuf },
    #[error("Site {site} has no remote path")]
    MissingRemote { site: String },
    #[error("Could not translate the local path of site {site}: {source}")]
    PathTranslation {
        site: String,
        #[source]
        source: PathTranslationError,
    },
}

// =============================================================================
// Raw settings
// =============================================================================

/// Settings exactly as written in the config file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    #[serde(default)]
    pub on_save: bool,
    #[serde(default)]
    pub on_save_individual: bool,
    #[serde(default)]
    pub on_load_individual: bool,
    #[serde(default)]
    pub show_progress: bool,
    #[serde(default)]
    pub notification: bool,
    #[serde(default)]
    pub auto_show_output: bool,
    #[serde(default = "default_true")]
    pub auto_show_output_on_error: bool,
    #[serde(default)]
    pub auto_hide_output: bool,

    /// cygpath-style bridge executable
    #[serde(default)]
    pub cygpath: Option<String>,
    #[serde(default, rename = "useWSL")]
    pub use_wsl: bool,

    /// Patterns handed to the filesystem watcher
    #[serde(default)]
    pub watch_globs: Vec<String>,

    /// Top-level per-site keys, i.e. the default site
    #[serde(flatten)]
    pub defaults: SiteOverride,

    #[serde(default)]
    pub sites: Vec<SiteOverride>,
}

fn default_true() -> bool {
    true
}

impl RawSettings {
    /// Load raw settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Per-site settings where every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteOverride {
    pub name: Option<String>,
    pub local: Option<String>,
    pub remote: Option<String>,
    pub delete: Option<bool>,
    pub flags: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub include: Option<Vec<String>>,
    pub chmod: Option<String>,
    pub shell: Option<String>,
    pub executable_shell: Option<String>,
    pub executable: Option<String>,
    pub options: Option<Vec<Vec<String>>>,
    pub args: Option<Vec<String>>,
    pub up_only: Option<bool>,
    pub down_only: Option<bool>,
    pub after_sync: Option<Vec<String>>,
}

impl SiteOverride {
    /// Shallow merge: every field set here wins (an empty list included),
    /// every unset field is taken from `base`.
    pub fn layered_over(&self, base: &SiteOverride) -> SiteOverride {
        fn pick<T: Clone>(over: &Option<T>, base: &Option<T>) -> Option<T> {
            over.as_ref().or(base.as_ref()).cloned()
        }

        SiteOverride {
            name: pick(&self.name, &base.name),
            local: pick(&self.local, &base.local),
            remote: pick(&self.remote, &base.remote),
            delete: pick(&self.delete, &base.delete),
            flags: pick(&self.flags, &base.flags),
            exclude: pick(&self.exclude, &base.exclude),
            include: pick(&self.include, &base.include),
            chmod: pick(&self.chmod, &base.chmod),
            shell: pick(&self.shell, &base.shell),
            executable_shell: pick(&self.executable_shell, &base.executable_shell),
            executable: pick(&self.executable, &base.executable),
            options: pick(&self.options, &base.options),
            args: pick(&self.args, &base.args),
            up_only: pick(&self.up_only, &base.up_only),
            down_only: pick(&self.down_only, &base.down_only),
            after_sync: pick(&self.after_sync, &base.after_sync),
        }
    }
}

// =============================================================================
// Resolved site
// =============================================================================

/// A fully resolved synchronization target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Site {
    pub name: Option<String>,
    /// Local path after token substitution, as the user spelled it
    pub local_path: String,
    /// Local path in the sync tool's syntax, ending in a separator
    pub translated_local_path: String,
    /// Remote path, ending in a separator
    pub remote_path: String,
    pub up_only: bool,
    pub down_only: bool,
    pub delete_files: bool,
    pub flags: String,
    pub exclude: Vec<String>,
    pub include: Vec<String>,
    pub chmod: Option<String>,
    /// Remote shell handed to the sync tool (`-e`)
    pub shell: Option<String>,
    /// Shell the sync tool itself is launched under
    pub executable_shell: Option<String>,
    pub executable: String,
    /// Command followed by its arguments; empty when there is none
    pub after_sync: Vec<String>,
    pub options: Vec<Vec<String>>,
    pub args: Vec<String>,
}

impl Site {
    /// Apply fallbacks, tokens, trailing separators and path translation
    fn resolve(
        layer: &SiteOverride,
        ctx: &WorkspaceContext,
        translator: &PathTranslator,
    ) -> Result<Self, ConfigError> {
        let root_vars = ctx.root_vars();
        let all_vars = ctx.all_vars();

        let local_path = match layer.local.as_deref() {
            Some(local) => anchored(substitute(local, &root_vars), ctx),
            None => ctx.root_str(),
        };

        let label = layer.name.clone().unwrap_or_else(|| local_path.clone());

        let remote = layer
            .remote
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRemote {
                site: label.clone(),
            })?;
        let remote_path = with_trailing_separator(&substitute(remote, &all_vars));

        let translated = translator
            .translate_path(&local_path)
            .map_err(|source| ConfigError::PathTranslation {
                site: label.clone(),
                source,
            })?;
        let translated_local_path = with_trailing_separator(&translated);

        let options = layer
            .options
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|group| group.iter().map(|s| substitute(s, &root_vars)).collect())
            .collect();

        Ok(Site {
            name: layer.name.clone(),
            local_path,
            translated_local_path,
            remote_path,
            up_only: layer.up_only.unwrap_or(false),
            down_only: layer.down_only.unwrap_or(false),
            delete_files: layer.delete.unwrap_or(false),
            flags: layer
                .flags
                .clone()
                .unwrap_or_else(|| DEFAULT_FLAGS.to_string()),
            exclude: layer
                .exclude
                .clone()
                .unwrap_or_else(|| DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect()),
            include: layer.include.clone().unwrap_or_default(),
            chmod: layer.chmod.clone(),
            shell: layer.shell.clone(),
            executable_shell: layer.executable_shell.clone(),
            executable: layer
                .executable
                .clone()
                .unwrap_or_else(|| DEFAULT_EXECUTABLE.to_string()),
            after_sync: layer.after_sync.clone().unwrap_or_default(),
            options,
            args: layer.args.clone().unwrap_or_default(),
        })
    }

    /// Registry key: the name, or the remote path for unnamed sites
    pub fn key(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.remote_path)
    }
}

/// Resolve a relative local path against the workspace root
fn anchored(local: String, ctx: &WorkspaceContext) -> String {
    if is_rooted(&local) {
        local
    } else {
        ctx.root.join(&local).to_string_lossy().into_owned()
    }
}

/// Absolute in either POSIX or Windows spelling, whatever the host
fn is_rooted(path: &str) -> bool {
    let bytes = path.as_bytes();
    let drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    drive || path.starts_with(['/', '\\']) || Path::new(path).is_absolute()
}

/// Make sure a path ends in exactly one separator
pub fn with_trailing_separator(path: &str) -> String {
    let sep = if path.contains('\\') && !path.contains('/') {
        '\\'
    } else {
        '/'
    };
    let trimmed = path.trim_end_matches(['/', '\\']);
    format!("{trimmed}{sep}")
}

// =============================================================================
// Resolved configuration
// =============================================================================

/// Process-wide resolved configuration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub on_save: bool,
    pub on_save_individual: bool,
    /// Download a file when an editor opens it. Unused by the CLI, which
    /// sees no open events; `down-file` is the manual equivalent.
    pub on_load_individual: bool,
    pub show_progress: bool,
    pub notification: bool,
    pub auto_show_output: bool,
    pub auto_show_output_on_error: bool,
    pub auto_hide_output: bool,
    pub cygpath: Option<String>,
    pub use_wsl: bool,
    pub watch_globs: Vec<String>,
    pub sites: Vec<Site>,
    #[serde(skip)]
    pub registry: SiteRegistry,
}

impl Config {
    /// Resolve raw settings against a workspace.
    ///
    /// Spawns the path bridge (blocking) once per site. Any translation
    /// failure aborts the whole build.
    pub fn build(raw: &RawSettings, ctx: &WorkspaceContext) -> Result<Self, ConfigError> {
        let translator = PathTranslator::new(raw.cygpath.as_deref(), raw.use_wsl);

        let layers = if raw.sites.is_empty() {
            vec![raw.defaults.clone()]
        } else {
            raw.sites
                .iter()
                .map(|site| site.layered_over(&raw.defaults))
                .collect()
        };

        let sites = layers
            .iter()
            .map(|layer| Site::resolve(layer, ctx, &translator))
            .collect::<Result<Vec<_>, _>>()?;
        let registry = SiteRegistry::from_sites(&sites);

        tracing::debug!(sites = sites.len(), root = %ctx.root.display(), "Configuration built");

        Ok(Config {
            on_save: raw.on_save,
            on_save_individual: raw.on_save_individual,
            on_load_individual: raw.on_load_individual,
            show_progress: raw.show_progress,
            notification: raw.notification,
            auto_show_output: raw.auto_show_output,
            auto_show_output_on_error: raw.auto_show_output_on_error,
            auto_hide_output: raw.auto_hide_output,
            cygpath: raw.cygpath.clone(),
            use_wsl: raw.use_wsl,
            watch_globs: raw.watch_globs.clone(),
            sites,
            registry,
        })
    }

    /// The translator this configuration was built with
    pub fn translator(&self) -> PathTranslator {
        PathTranslator::new(self.cygpath.as_deref(), self.use_wsl)
    }

    /// Find configuration file by searching up from a directory
    pub fn find_config(start_dir: &Path) -> Result<PathBuf, ConfigError> {
        let mut current = start_dir.to_path_buf();

        loop {
            let nested = current.join(DEFAULT_CONFIG_DIR).join(CONFIG_FILE_NAME);
            if nested.exists() {
                return Ok(nested);
            }

            let root_config = current.join(CONFIG_FILE_NAME);
            if root_config.exists() {
                return Ok(root_config);
            }

            if !current.pop() {
                return Err(ConfigError::NotFound {
                    start: start_dir.to_path_buf(),
                });
            }
        }
    }

    /// Workspace root for a config file (parent of `.sitesync` or the file's directory)
    pub fn project_root(config_path: &Path) -> PathBuf {
        let parent = config_path.parent().unwrap_or(config_path);

        if parent.file_name().is_some_and(|name| name == DEFAULT_CONFIG_DIR) {
            parent.parent().unwrap_or(parent).to_path_buf()
        } else {
            parent.to_path_buf()
        }
    }
}

/// Where a configuration comes from; rebuilt from scratch on every change
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub folder: Option<PathBuf>,
}

impl ConfigSource {
    pub fn new(path: PathBuf, folder: Option<PathBuf>) -> Self {
        Self { path, folder }
    }

    pub fn context(&self) -> WorkspaceContext {
        let ctx = WorkspaceContext::new(Config::project_root(&self.path));
        match &self.folder {
            Some(folder) => ctx.with_folder(folder),
            None => ctx,
        }
    }

    /// Read and resolve the configuration (blocking)
    pub fn build(&self) -> Result<Config, ConfigError> {
        let raw = RawSettings::load(&self.path)?;
        Config::build(&raw, &self.context())
    }
}
