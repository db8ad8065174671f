//! Input file discovery and the processed-file marker

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::FileOrder;
use crate::error::{DiscoveryError, FileError};

/// Resolve `pattern` to the regular files it matches, ordered by `order`.
///
/// Dot-files only match a pattern that spells out the leading dot, so files
/// already marked processed are skipped on re-runs. Unreadable directory
/// entries are logged and ignored.
pub fn discover_files(pattern: &str, order: FileOrder) -> Result<Vec<PathBuf>, DiscoveryError> {
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..glob::MatchOptions::new()
    };
    let paths = glob::glob_with(pattern, options).map_err(|source| DiscoveryError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "skipping unreadable path"),
        }
    }

    sort_files(&mut files, order);
    Ok(files)
}

pub fn sort_files(files: &mut [PathBuf], order: FileOrder) {
    match order {
        FileOrder::None => {}
        FileOrder::Name => files.sort(),
        FileOrder::NameDesc => files.sort_by(|a, b| b.cmp(a)),
        FileOrder::Mtime => {
            // Oldest first
            files.sort_by_key(|path| {
                fs::metadata(path)
                    .and_then(|m| m.modified())
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
            });
        }
    }
}

/// Path a file is renamed to once processed: `dir/name` -> `dir/.name`
pub fn processed_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}", name))
}

/// Mark a file as processed by renaming it to a dot-file
pub fn dot_rename(path: &Path) -> Result<PathBuf, FileError> {
    let target = processed_path(path);
    fs::rename(path, &target).map_err(|source| FileError::Rename {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_discover_skips_dot_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.tsv.gz");
        touch(dir.path(), "a.tsv.gz");
        touch(dir.path(), ".c.tsv.gz");
        touch(dir.path(), "d.txt");
        fs::create_dir(dir.path().join("e.tsv.gz")).unwrap();

        let pattern = format!("{}/*.tsv.gz", dir.path().display());
        let files = discover_files(&pattern, FileOrder::Name).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.tsv.gz", "b.tsv.gz"]);
    }

    #[test]
    fn test_discover_name_desc() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "20170929000000.tsv.gz");
        touch(dir.path(), "20170929000100.tsv.gz");

        let pattern = format!("{}/*.tsv.gz", dir.path().display());
        let files = discover_files(&pattern, FileOrder::NameDesc).unwrap();
        assert!(files[0].ends_with("20170929000100.tsv.gz"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = discover_files("/data/[", FileOrder::Name).unwrap_err();
        assert!(matches!(err, DiscoveryError::Pattern { .. }));
    }

    #[test]
    fn test_no_matches_is_empty() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/*.tsv.gz", dir.path().display());
        assert!(discover_files(&pattern, FileOrder::Name).unwrap().is_empty());
    }

    #[test]
    fn test_dot_rename() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "apps.tsv.gz");

        let target = dot_rename(&path).unwrap();
        assert_eq!(target, dir.path().join(".apps.tsv.gz"));
        assert!(!path.exists());
        assert!(target.exists());
    }

    #[test]
    fn test_dot_rename_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = dot_rename(&dir.path().join("gone.tsv.gz")).unwrap_err();
        assert!(matches!(err, FileError::Rename { .. }));
    }
}
