use crate::error::Error;
use crate::path_utils::{ancestor_chain, normalize_path};
use crate::types::Entry;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories visited on the way down from the root. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationStack {
    paths: Vec<PathBuf>,
}

impl NavigationStack {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self {
            paths: vec![normalize_path(root.as_ref())?],
        })
    }

    /// Rebuilds a stack whose current directory is `current`, with its ancestors under
    /// `root` as the history.
    pub fn restore(root: impl AsRef<Path>, current: impl AsRef<Path>) -> Result<Self, Error> {
        let root = normalize_path(root.as_ref())?;
        let current = normalize_path(current.as_ref())?;
        Ok(Self {
            paths: ancestor_chain(&root, &current),
        })
    }

    /// Enters the selected directory.
    pub fn push(&mut self, entry: &Entry) -> Result<&Path, Error> {
        let path = normalize_path(&entry.path)?;
        debug!("NAV_PUSH: {}", path.display());
        self.paths.push(path);
        Ok(self.current())
    }

    /// Leaves the current directory. `None` at the root, where the stack is left untouched.
    pub fn pop(&mut self) -> Option<&Path> {
        if self.paths.len() <= 1 {
            return None;
        }

        if let Some(left) = self.paths.pop() {
            debug!("NAV_POP: {}", left.display());
        }
        Some(self.current())
    }

    pub fn current(&self) -> &Path {
        // Never empty: constructed with the root and `pop` keeps it.
        &self.paths[self.paths.len() - 1]
    }

    pub fn root(&self) -> &Path {
        &self.paths[0]
    }

    pub fn depth(&self) -> usize {
        self.paths.len()
    }

    pub fn is_at_root(&self) -> bool {
        self.paths.len() == 1
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Drops everything but the root.
    pub fn reset(&mut self) {
        self.paths.truncate(1);
    }
}
