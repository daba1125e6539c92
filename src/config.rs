// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of a __bundle recipe__, the configuration file that
//! describes which packages make up an AppDir, where their archives come
//! from, and how they are split into partitions. The recipe is parsed once
//! and then treated as an immutable value for the rest of a bundle run.

use crate::path::{default_cache_dir, is_contained_relative, NoWayHome};

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Bundle recipe layout.
///
/// # General Layout
///
/// A recipe is composed of two parts: settings and partitions. The settings
/// section names the bundle root, the package sources, and the include and
/// exclude patterns. The partitions section maps a subdirectory of the
/// bundle to the seed packages that should be placed there instead of the
/// bundle root.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct BundleRecipe {
    /// Settings for the bundle.
    pub settings: BundleSettings,

    /// Partition name to seed package listing.
    #[serde(default)]
    pub partitions: BTreeMap<String, Vec<String>>,
}

impl BundleRecipe {
    /// Read and parse recipe file at `path`.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if the file cannot be read.
    /// - Return any error of [`BundleRecipe::from_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = read_to_string(path).map_err(|err| ConfigError::Read {
            source: err,
            path: path.to_path_buf(),
        })?;

        data.parse()
    }

    /// Directory holding the apt environment and downloaded archives.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if no cache directory is set and
    ///   the default one cannot be determined.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.settings.cache_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(default_cache_dir()?),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.settings.include.iter().all(|pattern| pattern.is_empty()) {
            return Err(ConfigError::Invalid(
                "settings.include must name at least one package".into(),
            ));
        }

        for name in self.partitions.keys() {
            if !is_contained_relative(Path::new(name)) {
                return Err(ConfigError::Invalid(format!(
                    "partition {name:?} must be a relative path inside the bundle"
                )));
            }
        }

        Ok(())
    }
}

impl FromStr for BundleRecipe {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut recipe: BundleRecipe =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path setting.
        recipe.settings.app_dir = expand_path(&recipe.settings.app_dir)?;
        if let Some(cache_dir) = &recipe.settings.cache_dir {
            recipe.settings.cache_dir = Some(expand_path(cache_dir)?);
        }

        recipe.validate()?;

        Ok(recipe)
    }
}

impl Display for BundleRecipe {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())?.into_owned(),
    ))
}

/// Bundle configuration settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct BundleSettings {
    /// Root directory of the bundle to assemble.
    pub app_dir: PathBuf,

    /// Where to keep the apt environment and downloaded archives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Debian architecture to resolve packages for.
    pub arch: String,

    /// Runtime generator used to launch the bundle.
    #[serde(default)]
    pub apprun: AppRun,

    /// Apt source lines, written verbatim to `sources.list`.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Package names to bundle. Also act as include overrides.
    pub include: Vec<String>,

    /// Extra package patterns to leave out of the bundle.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Accept packages from unsigned repositories.
    #[serde(default)]
    pub allow_unauthenticated: bool,
}

/// Runtime generator that launches the bundled application.
///
/// Each generator ships some packages of its own, which therefore never
/// need to be bundled again.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppRun {
    #[default]
    Classic,
    Proot,
    Wrapper,
}

impl AppRun {
    /// Packages provided by the runtime generator itself.
    pub fn provided_packages(&self) -> &'static [&'static str] {
        match self {
            Self::Classic => &["coreutils"],
            Self::Proot => &["proot", "coreutils"],
            Self::Wrapper => &[],
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read recipe file.
    #[error("failed to read recipe at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Configuration is well formed but unusable.
    #[error("invalid recipe: {0}")]
    Invalid(String),

    /// Default cache directory cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
