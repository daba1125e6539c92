// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symbolic link relativization.
//!
//! Packages install symbolic links pointing at absolute system paths, e.g.,
//! `/usr/lib/x86_64-linux-gnu/libfoo.so -> /usr/lib/x86_64-linux-gnu/libfoo.so.1`.
//! Once a package is extracted into a bundle, such a target escapes the
//! bundle. However, both ends of the link were extracted with the same
//! relative layout, so the __offset__ between link and target still holds.
//!
//! Relativization treats the bundle as if it were mounted at `/`, and
//! rewrites the absolute target as a path relative to the directory holding
//! the link. Relative targets are assumed to be bundle-relative already, and
//! are left alone. Targets are never checked for existence.

use std::{
    ffi::OsString,
    fs::{read_link, remove_file, symlink_metadata},
    io::ErrorKind,
    os::unix::fs::symlink,
    path::{Component, Path, PathBuf},
};
use tracing::debug;

/// Rewrite absolute symlink at `root/file` to a relative one.
///
/// Returns the new link target if a rewrite happened. Paths that do not
/// exist or are not symbolic links are left alone.
///
/// # Errors
///
/// - Return [`RelinkError::Inspect`] if the link cannot be inspected.
/// - Return [`RelinkError::Replace`] if the link cannot be replaced.
pub fn relativize(root: &Path, file: &Path) -> Result<Option<PathBuf>> {
    let path = root.join(file);
    let metadata = match symlink_metadata(&path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(RelinkError::Inspect { source: error, path }),
    };

    if !metadata.file_type().is_symlink() {
        return Ok(None);
    }

    let target = read_link(&path).map_err(|err| RelinkError::Inspect {
        source: err,
        path: path.clone(),
    })?;
    if !target.is_absolute() {
        return Ok(None);
    }

    let new_target = relative_link_target(file, &target);
    debug!(
        "fix symlink {} target: from {} to {}",
        file.display(),
        target.display(),
        new_target.display()
    );

    remove_file(&path)
        .and_then(|_| symlink(&new_target, &path))
        .map_err(|err| RelinkError::Replace { source: err, path })?;

    Ok(Some(new_target))
}

/// Compute target of link at `link` relative to its own directory.
///
/// Both `link` and `target` are interpreted as rooted at `/`. Works purely
/// on path components: `.` is dropped and `..` removes its parent.
pub fn relative_link_target(link: &Path, target: &Path) -> PathBuf {
    let base = lexical_components(link.parent().unwrap_or(Path::new("")));
    let target = lexical_components(target);

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(lhs, rhs)| lhs == rhs)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component);
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }

    relative
}

fn lexical_components(path: &Path) -> Vec<OsString> {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => components.push(name.to_os_string()),
            Component::ParentDir => {
                components.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    components
}

/// Symbolic link rewrite error types.
#[derive(Debug, thiserror::Error)]
pub enum RelinkError {
    /// Link or its target cannot be read.
    #[error("failed to inspect {:?}", path.display())]
    Inspect {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Link cannot be removed and recreated.
    #[error("failed to replace symlink {:?}", path.display())]
    Replace {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = RelinkError> = std::result::Result<T, E>;
