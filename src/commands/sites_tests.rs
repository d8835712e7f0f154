#[cfg(test)]
mod tests {
    use crate::commands::sites::{shadowed_keys, site_entries};
    use sitesync::{Config, RawSettings, WorkspaceContext};

    fn config(toml: &str) -> Config {
        let raw: RawSettings = toml::from_str(toml).unwrap();
        Config::build(&raw, &WorkspaceContext::new("/w")).unwrap()
    }

    #[test]
    fn test_site_entries_without_bridge() {
        let cfg = config(
            r#"
            remote = "host:/srv"

            [[sites]]
            name = "web"
            upOnly = true
        "#,
        );

        let entries = site_entries(&cfg);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "web");
        assert_eq!(entries[0].local_path, "/w");
        assert_eq!(entries[0].translated_local_path, "/w/");
        assert_eq!(entries[0].untranslated_local_path.as_deref(), Some("/w/"));
        assert!(entries[0].up_only);
    }

    #[test]
    fn test_shadowed_keys() {
        let cfg = config(
            r#"
            remote = "host:/srv"

            [[sites]]
            name = "a"

            [[sites]]
            name = "b"

            [[sites]]
            name = "a"
            remote = "other:/srv"
        "#,
        );

        assert_eq!(shadowed_keys(&cfg), ["a"]);
        assert!(shadowed_keys(&config(r#"remote = "host:/srv""#)).is_empty());
    }
}
