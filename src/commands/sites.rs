use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use sitesync::Config;

use super::Workspace;

#[derive(Debug, Serialize)]
pub(crate) struct SiteEntry {
    pub key: String,
    pub local_path: String,
    pub translated_local_path: String,
    /// Bridge round-trip of the translated path
    pub untranslated_local_path: Option<String>,
    pub remote_path: String,
    pub up_only: bool,
    pub down_only: bool,
    pub executable: String,
}

pub(crate) fn site_entries(config: &Config) -> Vec<SiteEntry> {
    let translator = config.translator();

    config
        .sites
        .iter()
        .map(|site| {
            let untranslated = match translator.untranslate(Some(&site.translated_local_path)) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(site = %site.key(), error = %e, "Could not untranslate local path");
                    None
                }
            };
            SiteEntry {
                key: site.key().to_string(),
                local_path: site.local_path.clone(),
                translated_local_path: site.translated_local_path.clone(),
                untranslated_local_path: untranslated,
                remote_path: site.remote_path.clone(),
                up_only: site.up_only,
                down_only: site.down_only,
                executable: site.executable.clone(),
            }
        })
        .collect()
}

/// Registry keys whose site is overwritten by a later one with the same key
pub(crate) fn shadowed_keys(config: &Config) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut shadowed = Vec::new();
    for site in &config.sites {
        let key = site.key();
        if seen.contains(&key) {
            if !shadowed.iter().any(|k: &String| k == key) {
                shadowed.push(key.to_string());
            }
        } else {
            seen.push(key);
        }
    }
    shadowed
}

/// Show the resolved sites
pub fn run_sites(workspace: &Workspace, json: bool) -> Result<()> {
    let entries = site_entries(&workspace.config);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!(
        "{} {}\n",
        "Config:".bold(),
        workspace.source.path.display().to_string().dimmed()
    );
    for entry in &entries {
        let restriction = match (entry.up_only, entry.down_only) {
            (true, true) => " (never syncs)".red().to_string(),
            (true, false) => " (up only)".yellow().to_string(),
            (false, true) => " (down only)".yellow().to_string(),
            (false, false) => String::new(),
        };
        println!("{}{}", entry.key.bold(), restriction);
        println!("  local:  {}", entry.local_path);
        if entry.translated_local_path != entry.local_path {
            println!("  as:     {}", entry.translated_local_path.dimmed());
        }
        println!("  remote: {}", entry.remote_path);
    }

    for key in shadowed_keys(&workspace.config) {
        println!(
            "\n{} More than one site uses the key {}; only the last is selectable",
            "!".yellow(),
            key.bold()
        );
    }

    Ok(())
}
