//! Directory-scan source provider.
//!
//! Maps the contributor model onto a plain directory tree:
//! `<root>/<contributor>/<path>/*.json`. Suits deployments where plugins
//! are dropped into a folder and picked up on restart.

use std::path::PathBuf;

use tracing::debug;

use super::{PredefinedSource, SourceProvider};

/// A [`SourceProvider`] backed by the local filesystem.
pub struct FsSourceProvider {
    root: PathBuf,
}

impl FsSourceProvider {
    /// Create a provider rooted at `root`. Each direct subdirectory is
    /// one contributor.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The contributor ids currently present, sorted.
    pub fn contributors(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut contributors: Vec<String> = entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                if entry.file_type().ok()?.is_dir() {
                    Some(entry.file_name().to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect();
        contributors.sort();
        contributors
    }
}

impl SourceProvider for FsSourceProvider {
    fn list_predefined_sources(
        &self,
        contributor_id: &str,
        path: &str,
    ) -> anyhow::Result<Vec<PredefinedSource>> {
        let dir = self.root.join(contributor_id).join(path);
        if !dir.is_dir() {
            debug!("No predefined sources under {}", dir.display());
            return Ok(Vec::new());
        }

        let mut sources = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file = entry.path();
            let is_json = file.extension().and_then(|e| e.to_str()) == Some("json");
            if !is_json || !file.is_file() {
                continue;
            }
            let bytes = std::fs::read(&file)?;
            sources.push(PredefinedSource {
                locator: file.to_string_lossy().into_owned(),
                bytes,
            });
        }
        // Deterministic default order; per-type comparators resort later.
        sources.sort_by(|a, b| a.locator.cmp(&b.locator));
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("strata-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_lists_json_sources_sorted() {
        let root = scratch_dir("fs-sorted");
        write(&root.join("plugin-a/rules/20-second.json"), "{}");
        write(&root.join("plugin-a/rules/10-first.json"), "{}");
        write(&root.join("plugin-a/rules/readme.txt"), "not an item");

        let provider = FsSourceProvider::new(&root);
        let sources = provider.list_predefined_sources("plugin-a", "rules").unwrap();

        assert_eq!(sources.len(), 2);
        assert!(sources[0].locator.ends_with("10-first.json"));
        assert!(sources[1].locator.ends_with("20-second.json"));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_directory_yields_no_sources() {
        let root = scratch_dir("fs-missing");
        let provider = FsSourceProvider::new(&root);

        let sources = provider.list_predefined_sources("ghost", "rules").unwrap();
        assert!(sources.is_empty());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_contributors_are_subdirectories() {
        let root = scratch_dir("fs-contributors");
        write(&root.join("plugin-b/rules/a.json"), "{}");
        write(&root.join("plugin-a/rules/a.json"), "{}");
        write(&root.join("stray-file.json"), "{}");

        let provider = FsSourceProvider::new(&root);
        assert_eq!(provider.contributors(), vec!["plugin-a", "plugin-b"]);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
