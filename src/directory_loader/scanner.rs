use crate::config::PickerConfig;
use crate::error::ScanError;
use crate::types::{Entry, Snapshot};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Produces a listing of one directory. Called from worker threads only.
pub trait DirectoryScanner: Send + Sync + 'static {
    fn scan(&self, path: &Path) -> Result<Snapshot, ScanError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsScanner {
    pub show_hidden: bool,
    pub directories_first: bool,
}

impl Default for FsScanner {
    fn default() -> Self {
        Self {
            show_hidden: false,
            directories_first: true,
        }
    }
}

impl FsScanner {
    pub fn from_config(config: &PickerConfig) -> Self {
        Self {
            show_hidden: config.show_hidden,
            directories_first: config.directories_first,
        }
    }
}

impl DirectoryScanner for FsScanner {
    fn scan(&self, path: &Path) -> Result<Snapshot, ScanError> {
        let scan_start = std::time::Instant::now();
        debug!("SCAN_START: Listing {}", path.display());

        let metadata = fs::metadata(path).map_err(|e| ScanError::from_io(path, &e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(path.to_path_buf()));
        }

        let read_dir = fs::read_dir(path).map_err(|e| ScanError::from_io(path, &e))?;

        let mut members = Vec::with_capacity(64);
        for dir_entry in read_dir {
            let dir_entry = dir_entry.map_err(|e| ScanError::from_io(path, &e))?;
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            if !self.show_hidden && name.starts_with('.') {
                continue;
            }
            members.push((name, dir_entry.path()));
        }

        let mut entries: Vec<Entry> = members
            .into_par_iter()
            .map(|(name, member_path)| entry_with_metadata(name, member_path))
            .collect();

        let directories_first = self.directories_first;
        entries.sort_by(|a, b| compare_entries(a, b, directories_first));

        info!(
            "SCAN_COMPLETE: {} entries in {} ({:?})",
            entries.len(),
            path.display(),
            scan_start.elapsed()
        );

        Ok(Snapshot::new(path.to_path_buf(), entries))
    }
}

fn entry_with_metadata(name: String, path: PathBuf) -> Entry {
    // Follow symlinks so linked directories stay navigable; dangling links fall back to
    // the link itself.
    let metadata = fs::metadata(&path).or_else(|_| fs::symlink_metadata(&path));

    match metadata {
        Ok(metadata) => {
            let is_directory = metadata.is_dir();
            let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
            Entry {
                name,
                path,
                is_directory,
                size: (!is_directory).then(|| metadata.len()),
                modified,
            }
        }
        Err(e) => {
            debug!("Entry vanished before stat: {} ({})", path.display(), e);
            Entry {
                name,
                path,
                is_directory: false,
                size: None,
                modified: None,
            }
        }
    }
}

pub fn compare_entries(a: &Entry, b: &Entry, directories_first: bool) -> Ordering {
    let by_kind = if directories_first {
        b.is_directory.cmp(&a.is_directory)
    } else {
        Ordering::Equal
    };

    by_kind
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("docs")).unwrap();
        fs::create_dir(root.join("Music")).unwrap();
        fs::create_dir(root.join(".config")).unwrap();
        File::create(root.join("notes.txt"))
            .unwrap()
            .write_all(b"hello")
            .unwrap();
        File::create(root.join("Archive.zip")).unwrap();
        File::create(root.join(".bashrc")).unwrap();
        temp
    }

    #[test]
    fn test_directories_first_case_insensitive() {
        let temp = fixture();
        let snapshot = FsScanner::default().scan(temp.path()).unwrap();

        assert_eq!(snapshot.path, temp.path());
        assert_eq!(snapshot.names(), vec!["docs", "Music", "Archive.zip", "notes.txt"]);
        assert!(snapshot.find("docs").unwrap().is_directory);
        assert!(!snapshot.find("notes.txt").unwrap().is_directory);
    }

    #[test]
    fn test_hidden_entries_only_when_configured() {
        let temp = fixture();
        let scanner = FsScanner {
            show_hidden: true,
            directories_first: true,
        };
        let snapshot = scanner.scan(temp.path()).unwrap();

        assert_eq!(
            snapshot.names(),
            vec![".config", "docs", "Music", ".bashrc", "Archive.zip", "notes.txt"]
        );
    }

    #[test]
    fn test_mixed_ordering_without_directories_first() {
        let temp = fixture();
        let scanner = FsScanner {
            show_hidden: false,
            directories_first: false,
        };
        let snapshot = scanner.scan(temp.path()).unwrap();

        assert_eq!(snapshot.names(), vec!["Archive.zip", "docs", "Music", "notes.txt"]);
    }

    #[test]
    fn test_metadata_is_collected() {
        let temp = fixture();
        let snapshot = FsScanner::default().scan(temp.path()).unwrap();

        let notes = snapshot.find("notes.txt").unwrap();
        assert_eq!(notes.size, Some(5));
        assert!(notes.modified.is_some());
        assert_eq!(notes.path, temp.path().join("notes.txt"));

        let docs = snapshot.find("docs").unwrap();
        assert_eq!(docs.size, None);
    }

    #[test]
    fn test_scan_is_stable_for_unchanged_directory() {
        let temp = fixture();
        let scanner = FsScanner::default();
        let first = scanner.scan(temp.path()).unwrap();
        let second = scanner.scan(temp.path()).unwrap();
        assert_eq!(first.names(), second.names());
    }

    #[test]
    fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        let snapshot = FsScanner::default().scan(temp.path()).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");

        let err = FsScanner::default().scan(&missing).unwrap_err();
        assert_eq!(err, ScanError::NotFound(missing));
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let temp = fixture();
        let file = temp.path().join("notes.txt");

        let err = FsScanner::default().scan(&file).unwrap_err();
        assert_eq!(err, ScanError::NotADirectory(file));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_listed_as_file() {
        let temp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(temp.path().join("nowhere"), temp.path().join("link")).unwrap();

        let snapshot = FsScanner::default().scan(temp.path()).unwrap();
        let link = snapshot.find("link").unwrap();
        assert!(!link.is_directory);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_navigable() {
        let temp = fixture();
        std::os::unix::fs::symlink(temp.path().join("docs"), temp.path().join("docs-link")).unwrap();

        let snapshot = FsScanner::default().scan(temp.path()).unwrap();
        assert!(snapshot.find("docs-link").unwrap().is_directory);
    }
}
