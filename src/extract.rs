// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package archive extraction.
//!
//! Unpack one package archive into a destination directory, and report the
//! files it wrote relative to that directory. Extraction knows nothing about
//! partitions. Callers pick the destination.

use crate::syscall::{syscall_capture, SyscallError};

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Tool that unpacks a single package archive.
pub trait Unpacker {
    /// Unpack `archive` into existing directory `destination`.
    ///
    /// Returns the paths written, relative to `destination`.
    fn unpack(&self, archive: &Path, destination: &Path) -> Result<Vec<PathBuf>>;
}

/// Unpack Debian archives through `dpkg-deb -X`.
#[derive(Debug, Default, Clone)]
pub struct DpkgDeb;

impl DpkgDeb {
    pub fn new() -> Self {
        Self
    }
}

impl Unpacker for DpkgDeb {
    fn unpack(&self, archive: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
        let syscall = syscall_capture(
            "dpkg-deb",
            [OsStr::new("-X"), archive.as_os_str(), destination.as_os_str()],
        )?;

        if !syscall.status.success() {
            return Err(ExtractionError::Unpack {
                archive: archive.to_path_buf(),
                message: syscall.message(),
            });
        }

        Ok(parse_listing(&syscall.stdout))
    }
}

/// Extract archive into destination, creating destination first.
///
/// # Errors
///
/// - Return [`ExtractionError::CreateDestination`] if the destination
///   directory cannot be created.
/// - Return any error of the given [`Unpacker`].
pub fn extract(unpacker: &impl Unpacker, archive: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
    mkdirp::mkdirp(destination).map_err(|err| ExtractionError::CreateDestination {
        source: err,
        path: destination.to_path_buf(),
    })?;

    let files = unpacker.unpack(archive, destination)?;
    debug!("extracted {} paths from {}", files.len(), archive.display());

    Ok(files)
}

/// Parse file listing printed by `dpkg-deb -X`.
///
/// Entries come as `./usr/bin/tool` or `./usr/lib/`. Leading `./` and `/`
/// are stripped, and the bare root entry is dropped. Spaces are part of the
/// file name and kept as is.
pub fn parse_listing(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .map(|line| line.trim_start_matches("./").trim_start_matches('/'))
        .map(|line| line.trim_end_matches('/'))
        .filter(|line| !line.is_empty() && *line != ".")
        .map(PathBuf::from)
        .collect()
}

/// Archive extraction error types.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Destination directory cannot be created.
    #[error("failed to create extraction directory {:?}", path.display())]
    CreateDestination {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Unpack tool reported failure.
    #[error("failed to unpack {:?}:\n{message}", archive.display())]
    Unpack { archive: PathBuf, message: String },

    /// Unpack tool could not be run.
    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = ExtractionError> = std::result::Result<T, E>;
