// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package manager integration.
//!
//! Bundling never touches the host's package database. Instead, apt is run
//! against a private __apt environment__ generated inside the cache
//! directory: its own `apt.conf`, its own `sources.list`, and its own dpkg
//! `status` file.
//!
//! # Installed Package Bookkeeping
//!
//! The private `status` file is how excluded packages are kept out of the
//! download. Every excluded package is recorded there as already installed,
//! so apt considers it satisfied and never fetches its archive. The file is
//! truncated at the start of each run to get a clean transitive closure.

use crate::{
    config::BundleRecipe,
    package::PackageRef,
    syscall::{syscall_non_interactive, SyscallError},
};

use indoc::formatdoc;
use std::{
    ffi::OsString,
    fs::write,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Package manager operations needed by a bundle run.
pub trait PackageManager {
    /// Generate package manager configuration.
    fn configure(&self) -> Result<()>;

    /// Refresh package index.
    fn update(&self) -> Result<()>;

    /// Forget every package recorded as installed.
    fn clear_installed_packages(&self) -> Result<()>;

    /// Record packages as installed, so they are never fetched.
    fn set_installed_packages(&self, packages: &[PackageRef]) -> Result<()>;

    /// Resolve transitive install list of requested packages.
    fn install_list(&self, packages: &[String]) -> Result<Vec<PackageRef>>;

    /// Fetch archives of requested packages into the package cache.
    fn install(&self, packages: &[String]) -> Result<()>;

    /// Directory holding downloaded package archives.
    fn archives_path(&self) -> PathBuf;
}

/// Layout of a private apt environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AptEnv {
    root: PathBuf,
    arch: String,
    sources: Vec<String>,
    allow_unauthenticated: bool,
}

impl AptEnv {
    /// Construct apt environment rooted at `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        arch: impl Into<String>,
        sources: impl IntoIterator<Item = impl Into<String>>,
        allow_unauthenticated: bool,
    ) -> Self {
        Self {
            root: root.into(),
            arch: arch.into(),
            sources: sources.into_iter().map(Into::into).collect(),
            allow_unauthenticated,
        }
    }

    /// Construct apt environment in `<cache_dir>/apt` of a recipe.
    ///
    /// # Errors
    ///
    /// - Return [`AptError::Config`] if the cache directory cannot be
    ///   determined.
    pub fn from_recipe(recipe: &BundleRecipe) -> Result<Self> {
        let settings = &recipe.settings;
        Ok(Self::new(
            recipe.cache_dir()?.join("apt"),
            &settings.arch,
            &settings.sources,
            settings.allow_unauthenticated,
        ))
    }

    pub fn apt_conf_path(&self) -> PathBuf {
        self.root.join("apt.conf")
    }

    pub fn sources_list_path(&self) -> PathBuf {
        self.root.join("sources.list")
    }

    pub fn status_path(&self) -> PathBuf {
        self.root.join("status")
    }

    pub fn archives_path(&self) -> PathBuf {
        self.root.join("cache").join("archives")
    }

    /// Write configuration files and create apt's directory layout.
    ///
    /// An existing `status` file is kept.
    ///
    /// # Errors
    ///
    /// - Return [`AptError::Write`] if any file or directory cannot be
    ///   created.
    #[instrument(skip(self), level = "debug")]
    pub fn generate(&self) -> Result<()> {
        info!("generate apt environment at {:?}", self.root.display());
        for dir in [
            self.root.join("state").join("lists").join("partial"),
            self.archives_path().join("partial"),
            self.root.join("sources.list.d"),
            self.root.join("trusted.gpg.d"),
        ] {
            mkdirp::mkdirp(&dir).map_err(|err| AptError::Write {
                source: err,
                path: dir.clone(),
            })?;
        }

        write_file(&self.apt_conf_path(), &self.render_apt_conf())?;
        write_file(&self.sources_list_path(), &self.render_sources_list())?;
        if !self.status_path().exists() {
            write_file(&self.status_path(), "")?;
        }

        Ok(())
    }

    /// Render `apt.conf` contents.
    pub fn render_apt_conf(&self) -> String {
        let root = self.root.display();
        formatdoc! {r#"
            Apt::Architecture "{arch}";
            Apt::Get::Download-Only "true";
            Apt::Get::AllowUnauthenticated "{allow}";
            Acquire::AllowInsecureRepositories "{allow}";
            Dir::State "{root}/state";
            Dir::State::status "{root}/status";
            Dir::Cache "{root}/cache";
            Dir::Etc::sourcelist "{root}/sources.list";
            Dir::Etc::sourceparts "{root}/sources.list.d";
            Dir::Etc::trusted "{root}/trusted.gpg";
            Dir::Etc::trustedparts "{root}/trusted.gpg.d";
            Debug::NoLocking "true";
            "#,
            arch = self.arch,
            allow = self.allow_unauthenticated,
            root = root,
        }
    }

    /// Render `sources.list` contents.
    pub fn render_sources_list(&self) -> String {
        self.sources.iter().fold(String::new(), |mut list, source| {
            list.push_str(source);
            list.push('\n');
            list
        })
    }

    /// Truncate dpkg status database.
    ///
    /// # Errors
    ///
    /// - Return [`AptError::Write`] if the status file cannot be written.
    pub fn clear_installed_packages(&self) -> Result<()> {
        write_file(&self.status_path(), "")
    }

    /// Record packages as installed in dpkg status database.
    ///
    /// Replaces whatever the status file contained before.
    ///
    /// # Errors
    ///
    /// - Return [`AptError::Write`] if the status file cannot be written.
    pub fn set_installed_packages(&self, packages: &[PackageRef]) -> Result<()> {
        write_file(&self.status_path(), &render_status(packages))
    }
}

/// Render dpkg status stanzas marking packages as installed.
pub fn render_status(packages: &[PackageRef]) -> String {
    packages
        .iter()
        .map(|package| {
            formatdoc! {"
                Package: {name}
                Status: install ok installed
                Version: {version}
                Architecture: {arch}

                ",
                name = package.name,
                version = package.version,
                arch = package.arch,
            }
        })
        .collect()
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    write(path, contents).map_err(|err| AptError::Write {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Package manager backed by `apt-get` and a private apt environment.
#[derive(Debug, Clone)]
pub struct AptGet {
    env: AptEnv,
}

impl AptGet {
    pub fn new(env: AptEnv) -> Self {
        Self { env }
    }

    fn expand_bin_args(&self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Vec<OsString> {
        let mut bin_args: Vec<OsString> = vec!["-c".into(), self.env.apt_conf_path().into()];
        bin_args.extend(args.into_iter().map(Into::into));

        bin_args
    }

    fn install_args(&self, packages: &[String], simulate: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "install".into(),
            "-y".into(),
            "--no-install-recommends".into(),
        ];
        if simulate {
            args.push("-s".into());
        }
        args.extend(packages.iter().map(OsString::from));

        self.expand_bin_args(args)
    }
}

impl PackageManager for AptGet {
    fn configure(&self) -> Result<()> {
        self.env.generate()
    }

    #[instrument(skip(self), level = "debug")]
    fn update(&self) -> Result<()> {
        info!("refresh package index");
        syscall_non_interactive("apt-get", self.expand_bin_args(["update"]))?;

        Ok(())
    }

    fn clear_installed_packages(&self) -> Result<()> {
        self.env.clear_installed_packages()
    }

    fn set_installed_packages(&self, packages: &[PackageRef]) -> Result<()> {
        self.env.set_installed_packages(packages)
    }

    #[instrument(skip(self), level = "debug")]
    fn install_list(&self, packages: &[String]) -> Result<Vec<PackageRef>> {
        let syscall = syscall_non_interactive("apt-get", self.install_args(packages, true))?;
        let install_list = parse_install_list(&syscall.stdout);
        debug!("{} packages resolved", install_list.len());

        Ok(install_list)
    }

    #[instrument(skip(self), level = "debug")]
    fn install(&self, packages: &[String]) -> Result<()> {
        info!("download {} requested packages", packages.len());
        syscall_non_interactive("apt-get", self.install_args(packages, false))?;

        Ok(())
    }

    fn archives_path(&self) -> PathBuf {
        self.env.archives_path()
    }
}

/// Parse simulated install output of `apt-get install -s`.
///
/// Only `Inst` lines are considered. They look like
/// `Inst libfoo1 (1.2-3 Ubuntu:20.04/focal [amd64])`, optionally with the
/// currently installed version in brackets before the parenthesis, and an
/// optional `:arch` qualifier on the package name.
pub fn parse_install_list(stdout: &str) -> Vec<PackageRef> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("Inst "))
        .filter_map(parse_inst_line)
        .collect()
}

fn parse_inst_line(line: &str) -> Option<PackageRef> {
    let mut tokens = line.split_whitespace();
    let qualified = tokens.next()?;
    let (name, qualifier) = match qualified.split_once(':') {
        Some((name, arch)) => (name, Some(arch)),
        None => (qualified, None),
    };

    let details = line
        .find('(')
        .and_then(|start| line[start + 1..].split_once(')'))
        .map(|(details, _)| details)
        .unwrap_or_default();
    let version = details.split_whitespace().next().unwrap_or_default();
    let bracket_arch = details
        .rfind('[')
        .and_then(|start| details[start + 1..].split_once(']'))
        .map(|(arch, _)| arch);
    let arch = qualifier.or(bracket_arch).unwrap_or_default();

    Some(PackageRef::new(name, version, arch))
}

/// Package manager error types.
#[derive(Debug, thiserror::Error)]
pub enum AptError {
    /// Apt environment file cannot be written.
    #[error("failed to write apt environment file {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Recipe does not yield a usable apt environment.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Invocation of apt-get fails.
    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = AptError> = std::result::Result<T, E>;
