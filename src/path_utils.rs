use std::path::{Component, Path, PathBuf};

use crate::error::Error;

/// Lexically normalizes a path into the form used as a session identity key.
///
/// Relative inputs are resolved against the working directory, `.` is dropped, `..` pops
/// the previous component and never climbs above the root. Symlinks are left alone so two
/// different routes to the same directory stay distinct targets.
pub fn normalize_path(path: &Path) -> Result<PathBuf, Error> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidPath(String::new()));
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if normalized.parent().is_some() {
                    normalized.pop();
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }

    Ok(normalized)
}

/// Directories from `root` down to `target`, both included.
///
/// When `target` does not live under `root` the chain degenerates to `[root, target]`.
pub fn ancestor_chain(root: &Path, target: &Path) -> Vec<PathBuf> {
    if root == target {
        return vec![root.to_path_buf()];
    }

    let Some(relative) = pathdiff::diff_paths(target, root) else {
        return vec![root.to_path_buf(), target.to_path_buf()];
    };

    let escapes_root = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes_root {
        return vec![root.to_path_buf(), target.to_path_buf()];
    }

    let mut chain = Vec::with_capacity(relative.components().count() + 1);
    let mut current = root.to_path_buf();
    chain.push(current.clone());
    for component in relative.components() {
        current.push(component);
        chain.push(current.clone());
    }
    chain
}
