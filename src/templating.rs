//! Workspace template tokens
//!
//! Site paths and option groups may reference the workspace they belong to
//! through `${workspaceRoot}`, `${workspaceFolder}` and
//! `${workspaceFolderBasename}`. Unknown tokens are left untouched.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

pub const WORKSPACE_ROOT: &str = "workspaceRoot";
pub const WORKSPACE_FOLDER: &str = "workspaceFolder";
pub const WORKSPACE_FOLDER_BASENAME: &str = "workspaceFolderBasename";

/// The workspace a configuration is resolved against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceContext {
    /// Root of the workspace (where the config lives)
    pub root: PathBuf,
    /// Active workspace folder; the root unless told otherwise
    pub folder: PathBuf,
}

impl WorkspaceContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            folder: root.clone(),
            root,
        }
    }

    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn root_str(&self) -> String {
        path_string(&self.root)
    }

    pub fn folder_str(&self) -> String {
        path_string(&self.folder)
    }

    pub fn folder_basename(&self) -> String {
        self.folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Variables available to local paths and option groups
    pub fn root_vars(&self) -> HashMap<String, String> {
        HashMap::from([(WORKSPACE_ROOT.to_string(), self.root_str())])
    }

    /// Variables available to remote paths
    pub fn all_vars(&self) -> HashMap<String, String> {
        let mut vars = self.root_vars();
        vars.insert(WORKSPACE_FOLDER.to_string(), self.folder_str());
        vars.insert(
            WORKSPACE_FOLDER_BASENAME.to_string(),
            self.folder_basename(),
        );
        vars
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Substitutes `${name}` placeholders in the content with variable values
pub fn substitute(content: &str, vars: &HashMap<String, String>) -> String {
    TEMPLATE_RE
        .replace_all(content, |caps: &regex::Captures| {
            let key = caps[1].trim();
            vars.get(key).cloned().unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute() {
        let ctx = WorkspaceContext::new("/home/u/proj").with_folder("/home/u/proj/web");
        let vars = ctx.all_vars();

        let result = substitute(
            "host:/srv/${workspaceFolderBasename} from ${workspaceRoot} (${ workspaceFolder }) ${unknown}",
            &vars,
        );

        assert_eq!(
            result,
            "host:/srv/web from /home/u/proj (/home/u/proj/web) ${unknown}"
        );
    }

    #[test]
    fn test_root_vars_only_know_the_root() {
        let ctx = WorkspaceContext::new("/w");
        let result = substitute("${workspaceRoot}/${workspaceFolder}", &ctx.root_vars());
        assert_eq!(result, "/w/${workspaceFolder}");
    }

    #[test]
    fn test_folder_defaults_to_root() {
        let ctx = WorkspaceContext::new("/home/u/proj");
        assert_eq!(ctx.folder, ctx.root);
        assert_eq!(ctx.folder_basename(), "proj");
    }
}
