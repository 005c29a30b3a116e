use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ScanError;

/// One member of a scanned directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
}

impl Entry {
    /// Entry without display metadata. Mostly useful for callers that synthesize
    /// selections and for tests.
    pub fn bare(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();

        Self {
            name,
            path,
            is_directory,
            size: None,
            modified: None,
        }
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Ordered listing of one directory, produced by a single scan and replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub path: PathBuf,
    pub entries: Vec<Entry>,
    pub generation: u64,
}

impl Snapshot {
    pub fn new(path: PathBuf, entries: Vec<Entry>) -> Self {
        Self {
            path,
            entries,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }
}

/// What the loader hands to its subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    Snapshot(Arc<Snapshot>),
    /// The listing can no longer be produced. The subscriber decides where to navigate.
    DirectoryGone { path: PathBuf, error: ScanError },
}

impl LoadEvent {
    pub fn path(&self) -> &Path {
        match self {
            LoadEvent::Snapshot(snapshot) => &snapshot.path,
            LoadEvent::DirectoryGone { path, .. } => path,
        }
    }
}

/// Which kinds of entries may finish a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    /// Only non-directory entries finalize. Directories are navigated.
    SelectFile,
    /// Entries only navigate; confirming the current directory finalizes.
    SelectDirectory,
    /// Files finalize on tap, directories through confirmation.
    #[default]
    SelectEither,
}

impl SelectMode {
    #[inline]
    pub fn accepts_files(self) -> bool {
        matches!(self, SelectMode::SelectFile | SelectMode::SelectEither)
    }

    #[inline]
    pub fn accepts_directories(self) -> bool {
        matches!(self, SelectMode::SelectDirectory | SelectMode::SelectEither)
    }
}

/// Terminal result handed back to whoever opened the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    Success(PathBuf),
    Cancelled,
}

/// Result of feeding one input to the selection controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Navigated(PathBuf),
    Ignored,
    Finished(SelectionOutcome),
}

/// State that survives process suspension. Absence means "start at the root".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedState {
    pub current: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_entry_takes_name_from_path() {
        let entry = Entry::bare("/tmp/docs/.hidden", false);
        assert_eq!(entry.name, ".hidden");
        assert!(entry.is_hidden());
        assert!(!entry.is_directory);
        assert_eq!(entry.size, None);
    }

    #[test]
    fn test_select_mode_acceptance() {
        assert!(SelectMode::SelectFile.accepts_files());
        assert!(!SelectMode::SelectFile.accepts_directories());
        assert!(!SelectMode::SelectDirectory.accepts_files());
        assert!(SelectMode::SelectDirectory.accepts_directories());
        assert!(SelectMode::SelectEither.accepts_files());
        assert!(SelectMode::SelectEither.accepts_directories());
        assert_eq!(SelectMode::default(), SelectMode::SelectEither);
    }

    #[test]
    fn test_load_event_path() {
        let snapshot = Arc::new(Snapshot::new(PathBuf::from("/a"), Vec::new()));
        assert_eq!(LoadEvent::Snapshot(snapshot).path(), Path::new("/a"));

        let gone = LoadEvent::DirectoryGone {
            path: PathBuf::from("/b"),
            error: ScanError::NotFound(PathBuf::from("/b")),
        };
        assert_eq!(gone.path(), Path::new("/b"));
    }
}
