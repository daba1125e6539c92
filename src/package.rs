// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package references and archive file naming.
//!
//! Debian archives in the package cache follow the naming convention
//! `<name>_<version>_<arch>.deb`. Package names never contain underscores,
//! but versions may carry an epoch encoded as `%3a`. Parsing therefore works
//! from the __end__ of the file name: the last two `_` fields are the version
//! and the architecture suffix, and whatever remains is the package name.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};

/// File extension of package archives in the cache.
pub const ARCHIVE_EXTENSION: &str = "deb";

/// A package resolved by the package manager.
///
/// Unique by name within a single bundle run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
    pub arch: String,
}

impl PackageRef {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: arch.into(),
        }
    }
}

impl Display for PackageRef {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{} ({} {})", self.name, self.version, self.arch)
    }
}

/// Check if path names a package archive by its extension.
pub fn is_deb_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .is_some_and(|ext| ext == ARCHIVE_EXTENSION)
}

/// Parse owning package name out of an archive file name.
///
/// Expects exactly two trailing `_`-delimited fields after the name once the
/// `.deb` extension is removed, i.e., `coreutils_8.30-3ubuntu2_amd64.deb`
/// yields `coreutils`.
///
/// # Errors
///
/// - Return [`ArchiveNameError::MissingFields`] if the file name does not
///   have a name, a version, and an architecture field.
/// - Return [`ArchiveNameError::EmptyName`] if the name field is empty.
pub fn package_name_from_archive(file_name: &str) -> Result<String> {
    let stem = file_name
        .strip_suffix(ARCHIVE_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .unwrap_or(file_name);
    let mut fields = stem.rsplitn(3, '_');
    let (Some(arch), Some(version), Some(name)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(ArchiveNameError::MissingFields {
            file_name: file_name.into(),
        });
    };

    if arch.is_empty() || version.is_empty() {
        return Err(ArchiveNameError::MissingFields {
            file_name: file_name.into(),
        });
    }

    if name.is_empty() {
        return Err(ArchiveNameError::EmptyName {
            file_name: file_name.into(),
        });
    }

    Ok(name.into())
}

/// Archive file name parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArchiveNameError {
    /// Archive name lacks the `<name>_<version>_<arch>` layout.
    #[error("archive {file_name:?} does not follow <name>_<version>_<arch>.deb")]
    MissingFields { file_name: String },

    /// Archive name has nothing in front of its version field.
    #[error("archive {file_name:?} has an empty package name")]
    EmptyName { file_name: String },
}

/// Friendly result alias :3
pub type Result<T, E = ArchiveNameError> = std::result::Result<T, E>;
