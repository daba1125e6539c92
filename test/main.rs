// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

mod integration;

use appdir_bundler::{
    apt::{AptError, PackageManager, Result as AptResult},
    extract::{ExtractionError, Result as ExtractResult, Unpacker},
    syscall::SyscallError,
    PackageRef,
};

use anyhow::Result;
use std::{
    cell::RefCell,
    collections::BTreeMap,
    fs::{create_dir_all, read_to_string, write},
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};

/// Package manager serving canned install lists from memory.
#[derive(Debug, Default)]
pub(crate) struct FakeApt {
    archives: PathBuf,
    closures: BTreeMap<String, Vec<PackageRef>>,
    fail_install: bool,
    pub(crate) calls: RefCell<Vec<String>>,
    pub(crate) installed: RefCell<Vec<PackageRef>>,
}

impl FakeApt {
    pub(crate) fn new(archives: impl Into<PathBuf>) -> Self {
        Self {
            archives: archives.into(),
            ..Self::default()
        }
    }

    /// Register transitive closure of a requested package.
    pub(crate) fn with_closure(
        mut self,
        name: &str,
        closure: impl IntoIterator<Item = (&'static str, &'static str)>,
    ) -> Self {
        let closure = closure
            .into_iter()
            .map(|(name, version)| PackageRef::new(name, version, "amd64"))
            .collect();
        self.closures.insert(name.into(), closure);
        self
    }

    pub(crate) fn failing_install(mut self) -> Self {
        self.fail_install = true;
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }
}

impl PackageManager for FakeApt {
    fn configure(&self) -> AptResult<()> {
        self.record("configure");
        Ok(())
    }

    fn update(&self) -> AptResult<()> {
        self.record("update");
        Ok(())
    }

    fn clear_installed_packages(&self) -> AptResult<()> {
        self.record("clear");
        self.installed.borrow_mut().clear();
        Ok(())
    }

    fn set_installed_packages(&self, packages: &[PackageRef]) -> AptResult<()> {
        self.record("set_installed");
        *self.installed.borrow_mut() = packages.to_vec();
        Ok(())
    }

    fn install_list(&self, packages: &[String]) -> AptResult<Vec<PackageRef>> {
        self.record(format!("install_list {}", packages.join(" ")));
        let mut install_list: Vec<PackageRef> = Vec::new();
        for package in packages {
            let closure = self.closures.get(package).ok_or_else(|| {
                AptError::Syscall(SyscallError::Failed {
                    cmd: "apt-get".into(),
                    message: format!("E: Unable to locate package {package}"),
                })
            })?;
            for entry in closure {
                if !install_list.contains(entry) {
                    install_list.push(entry.clone());
                }
            }
        }

        Ok(install_list)
    }

    fn install(&self, packages: &[String]) -> AptResult<()> {
        self.record(format!("install {}", packages.join(" ")));
        if self.fail_install {
            return Err(AptError::Syscall(SyscallError::Failed {
                cmd: "apt-get".into(),
                message: "E: Unable to fetch some archives".into(),
            }));
        }

        Ok(())
    }

    fn archives_path(&self) -> PathBuf {
        self.archives.clone()
    }
}

/// Unpacker reading plain text archive fixtures.
///
/// Each fixture line is one of:
///
/// - `file <path> <contents>`
/// - `link <path> <target>`
/// - `fail`
#[derive(Debug, Default)]
pub(crate) struct FixtureUnpacker;

impl Unpacker for FixtureUnpacker {
    fn unpack(&self, archive: &Path, destination: &Path) -> ExtractResult<Vec<PathBuf>> {
        let fixture_error = |err| ExtractionError::CreateDestination {
            source: err,
            path: destination.to_path_buf(),
        };
        let fixture = read_to_string(archive).map_err(fixture_error)?;

        let mut files = Vec::new();
        for line in fixture.lines() {
            let mut fields = line.splitn(3, ' ');
            let (kind, path, value) = (fields.next(), fields.next(), fields.next());
            match (kind, path, value) {
                (Some("file"), Some(path), Some(contents)) => {
                    let target = destination.join(path);
                    create_dir_all(target.parent().unwrap_or(destination)).map_err(fixture_error)?;
                    write(&target, contents).map_err(fixture_error)?;
                    files.push(PathBuf::from(path));
                }
                (Some("link"), Some(path), Some(link_target)) => {
                    let target = destination.join(path);
                    create_dir_all(target.parent().unwrap_or(destination)).map_err(fixture_error)?;
                    symlink(link_target, &target).map_err(fixture_error)?;
                    files.push(PathBuf::from(path));
                }
                _ => {
                    return Err(ExtractionError::Unpack {
                        archive: archive.to_path_buf(),
                        message: format!("corrupt archive line {line:?}"),
                    })
                }
            }
        }

        Ok(files)
    }
}

/// Write archive fixture into the package cache.
pub(crate) fn write_archive(
    archives: &Path,
    file_name: &str,
    lines: impl IntoIterator<Item = impl AsRef<str>>,
) -> Result<PathBuf> {
    create_dir_all(archives)?;
    let path = archives.join(file_name);
    let contents = lines.into_iter().fold(String::new(), |mut contents, line| {
        contents.push_str(line.as_ref());
        contents.push('\n');
        contents
    });
    write(&path, contents)?;

    Ok(path)
}
