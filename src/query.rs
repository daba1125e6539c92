// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Host package queries.
//!
//! Besides bundling archives fetched from a repository, files can also be
//! deployed straight from packages installed on the host. `dpkg-query` tells
//! which package owns a path and which files a package installed.

use crate::{
    relink::{relativize, RelinkError},
    syscall::{syscall_capture, SyscallError},
};

use std::{
    collections::{BTreeMap, BTreeSet},
    ffi::OsStr,
    fs::{copy, read_link, remove_file, symlink_metadata},
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

const NO_PATH_FOUND: &str = "dpkg-query: no path found matching pattern";

/// Determine Debian architecture of the host.
///
/// Returns `None` if `dpkg-architecture` is unavailable or fails.
pub fn host_arch() -> Option<String> {
    syscall_capture("dpkg-architecture", ["-q", "DEB_HOST_ARCH"])
        .ok()
        .filter(|syscall| syscall.status.success())
        .map(|syscall| syscall.stdout.trim().to_string())
        .filter(|arch| !arch.is_empty())
}

/// Query host dpkg database.
#[derive(Debug, Default, Clone)]
pub struct DpkgQuery {
    target_arch: Option<String>,
}

impl DpkgQuery {
    /// Construct new query targeting the host architecture.
    pub fn new() -> Self {
        Self {
            target_arch: host_arch(),
        }
    }

    /// Construct new query targeting a given architecture.
    pub fn with_target_arch(arch: impl Into<String>) -> Self {
        Self {
            target_arch: Some(arch.into()),
        }
    }

    /// Find packages owning a path on the host.
    ///
    /// Owners qualified with a foreign architecture are dropped.
    ///
    /// # Errors
    ///
    /// - Return [`QueryError::Syscall`] if `dpkg-query` cannot be run.
    pub fn find_owner_packages(&self, path: impl AsRef<Path>) -> Result<BTreeSet<String>> {
        let syscall = syscall_capture("dpkg-query", [OsStr::new("-S"), path.as_ref().as_os_str()])?;

        for line in syscall.stderr.lines() {
            if line.starts_with(NO_PATH_FOUND) {
                warn!("{line}");
            }
        }

        Ok(syscall
            .stdout
            .lines()
            .flat_map(parse_owner_line)
            .filter(|package| self.matches_target_arch(package))
            .map(|package| strip_arch(&package).to_string())
            .collect())
    }

    /// List files a package installed on the host.
    ///
    /// Directories and paths missing from the host are skipped. Unknown
    /// packages yield an empty listing.
    ///
    /// # Errors
    ///
    /// - Return [`QueryError::Syscall`] if `dpkg-query` cannot be run.
    pub fn list_package_files(&self, package: &str) -> Result<Vec<PathBuf>> {
        let syscall = syscall_capture("dpkg-query", ["-L", package])?;
        if !syscall.status.success() {
            return Ok(Vec::new());
        }

        Ok(syscall
            .stdout
            .lines()
            .map(PathBuf::from)
            .filter(|path| path.is_symlink() || path.is_file())
            .collect())
    }

    /// Copy files of host packages into the bundle.
    ///
    /// Every file keeps its absolute host path below `app_dir`. Copied
    /// symbolic links are relativized. Returns deployed file to owning
    /// package.
    ///
    /// # Errors
    ///
    /// - Return [`QueryError::Syscall`] if `dpkg-query` cannot be run.
    /// - Return [`QueryError::Deploy`] if a file cannot be copied.
    /// - Return [`QueryError::Relink`] if a copied link cannot be rewritten.
    pub fn deploy_packages(
        &self,
        packages: impl IntoIterator<Item = impl AsRef<str>>,
        app_dir: &Path,
    ) -> Result<BTreeMap<PathBuf, String>> {
        let mut deployed = BTreeMap::new();
        for package in packages {
            let package = package.as_ref();
            info!("deploy host package {package}");

            for file in self.list_package_files(package)? {
                let relative = file.strip_prefix("/").unwrap_or(&file).to_path_buf();
                deploy_file(&file, &app_dir.join(&relative))?;
                relativize(app_dir, &relative)?;
                deployed.insert(file, package.to_string());
            }
        }

        Ok(deployed)
    }

    fn matches_target_arch(&self, package: &str) -> bool {
        match (package.split_once(':'), &self.target_arch) {
            (Some((_, arch)), Some(target)) => arch == target,
            _ => true,
        }
    }
}

fn strip_arch(package: &str) -> &str {
    package.split_once(':').map_or(package, |(name, _)| name)
}

/// Parse one line of `dpkg-query -S` output into its owner packages.
///
/// Lines look like `libc6:amd64, libc6:i386: /usr/share/doc/libc6`.
/// Diversion notices are ignored.
pub fn parse_owner_line(line: &str) -> Vec<String> {
    if line.starts_with("diversion ") {
        return Vec::new();
    }

    line.split_once(": ")
        .map(|(owners, _)| {
            owners
                .split(',')
                .map(str::trim)
                .filter(|owner| !owner.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn deploy_file(source: &Path, target: &Path) -> Result<()> {
    let deploy_error = |err| QueryError::Deploy {
        source: err,
        path: target.to_path_buf(),
    };

    if let Some(parent) = target.parent() {
        mkdirp::mkdirp(parent).map_err(deploy_error)?;
    }

    if symlink_metadata(target).is_ok() {
        remove_file(target).map_err(deploy_error)?;
    }

    if source.is_symlink() {
        let link_target = read_link(source).map_err(deploy_error)?;
        symlink(link_target, target).map_err(deploy_error)?;
    } else {
        copy(source, target).map_err(deploy_error)?;
    }

    Ok(())
}

/// Host package query error types.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Host file cannot be deployed into the bundle.
    #[error("failed to deploy {:?}", path.display())]
    Deploy {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    Relink(#[from] RelinkError),

    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = QueryError> = std::result::Result<T, E>;
