//! Keyed lookup of resolved sites for interactive single-site runs

use std::collections::HashMap;

use crate::config::Site;

/// Sites keyed by name, falling back to the remote path.
///
/// Keys keep the order in which they were first seen; a later site with the
/// same key replaces the earlier one in place.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    keys: Vec<String>,
    sites: HashMap<String, Site>,
}

impl SiteRegistry {
    pub fn from_sites<'a>(sites: impl IntoIterator<Item = &'a Site>) -> Self {
        let mut registry = Self::default();
        for site in sites {
            registry.insert(site.clone());
        }
        registry
    }

    fn insert(&mut self, site: Site) {
        let key = site.key().to_string();
        if self.sites.insert(key.clone(), site).is_none() {
            self.keys.push(key);
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn get(&self, key: &str) -> Option<&Site> {
        self.sites.get(key)
    }
}
