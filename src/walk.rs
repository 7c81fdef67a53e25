//! Filesystem enumeration for the indexer.

use ignore::WalkBuilder;
use std::path::PathBuf;
use tracing::warn;

/// Temporary or "hidden" names the indexer never descends into: a last
/// component beginning with `.`, `#` or `~`, or ending with `~`.
pub fn skip_component(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('#') || name.starts_with('~') || name.ends_with('~')
}

/// Enumerate every regular file under the given roots, sorted and
/// deduplicated. Unreadable entries are logged and skipped.
pub fn walk_paths(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in roots {
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .filter_entry(|entry| match entry.file_name().to_str() {
                Some(name) => !skip_component(name),
                None => true,
            })
            .build();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|t| t.is_file()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => warn!("{e}"),
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_skip_component() {
        assert!(skip_component(".git"));
        assert!(skip_component("#scratch"));
        assert!(skip_component("~lock"));
        assert!(skip_component("backup~"));
        assert!(!skip_component("main.rs"));
        assert!(!skip_component("a~b"));
    }

    #[test]
    fn test_walk_skips_hidden_and_temp() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.rs"), "fn main() {}").unwrap();
        fs::write(tmp.path().join(".hidden"), "secret").unwrap();
        fs::write(tmp.path().join("editor.swp~"), "swap").unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join(".git/config"), "core").unwrap();
        fs::create_dir(tmp.path().join("src")).unwrap();
        fs::write(tmp.path().join("src/lib.rs"), "pub fn f() {}").unwrap();

        let files = walk_paths(&[tmp.path().to_path_buf()]);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["keep.rs".to_string(), "src/lib.rs".to_string()]);
    }

    #[test]
    fn test_walk_multiple_roots_dedups() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "aaa").unwrap();
        let root = tmp.path().to_path_buf();
        let files = walk_paths(&[root.clone(), root]);
        assert_eq!(files.len(), 1);
    }
}
