// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations for state that a bundle run needs to keep
//! outside of the bundle itself, i.e., the package cache and the generated
//! apt environment.

use std::path::{Component, Path, PathBuf};

/// Determine default absolute path to the package cache directory.
///
/// Uses XDG Base Directory path `$XDG_CACHE_HOME/appdir-bundler` as the
/// default. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if the user cache directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|path| path.join("appdir-bundler"))
        .ok_or(NoWayHome)
}

/// Show `path` relative to the bundle root as `AppDir/...` for log output.
///
/// Paths outside of `app_dir` are shown as is.
pub fn display_in_app_dir(app_dir: &Path, path: &Path) -> String {
    match path.strip_prefix(app_dir) {
        Ok(rest) if rest.as_os_str().is_empty() => "AppDir".into(),
        Ok(rest) => Path::new("AppDir").join(rest).display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

/// Check that `path` stays inside whatever directory it gets joined onto.
///
/// Rejects empty paths, absolute paths, and paths with `..` components.
pub fn is_contained_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// No way to determine user's cache directory.
///
/// # See Also
///
/// - [`dirs::cache_dir`](https://docs.rs/dirs/latest/dirs/fn.cache_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's cache directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
