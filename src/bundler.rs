// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bundle orchestration.
//!
//! A bundle run is a linear sequence of stages, never revisited:
//!
//! 1. Configure: generate the private apt environment.
//! 2. Refresh cache: update the package index, unless told not to.
//! 3. Reset state: forget every package recorded as installed.
//! 4. Extend partitions: attach the transitive requirements of each
//!    partition's seed packages.
//! 5. Classify: compute the exclusion list of the include set.
//! 6. Install: record exclusions as installed, then download the rest.
//! 7. Extract all: unpack every cached archive into its destination and
//!    relativize its symbolic links.
//!
//! Any failure before extraction aborts the run. During extraction, a single
//! archive that fails to unpack, or whose file name cannot be parsed, is
//! logged and skipped so the rest of the bundle still gets deployed.

use crate::{
    apt::{AptError, PackageManager},
    classify::Classifier,
    config::BundleRecipe,
    extract::{extract, Unpacker},
    package::{is_deb_file, package_name_from_archive, PackageRef},
    partition::{ExtendedPartition, Partition, PartitionLayout},
    path::display_in_app_dir,
    relink::{relativize, RelinkError},
};

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fs::read_dir,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Environment variable that disables the package index refresh.
pub const NO_UPDATE_ENV: &str = "APPDIR_BUNDLER_NO_UPDATE";

/// Options of a single bundle run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Refresh package index before resolving anything.
    pub refresh_index: bool,

    /// Draw progress bar while extracting.
    pub progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            refresh_index: true,
            progress: true,
        }
    }
}

impl RunOptions {
    /// Construct options from command line flag and environment.
    ///
    /// Refresh is skipped if `no_update` is set, or if [`NO_UPDATE_ENV`] is
    /// set to anything non-empty.
    pub fn from_env(no_update: bool) -> Self {
        let env_no_update = std::env::var_os(NO_UPDATE_ENV).is_some_and(|value| !value.is_empty());
        Self {
            refresh_index: !(no_update || env_no_update),
            ..Self::default()
        }
    }
}

/// Archive deployed into the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedArchive {
    pub archive: PathBuf,
    pub package: String,
    pub destination: PathBuf,
    pub files: Vec<PathBuf>,
    pub relinked: usize,
}

/// Archive left out of the bundle, with the reason why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArchive {
    pub archive: PathBuf,
    pub reason: String,
}

/// Outcome of a bundle run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BundleReport {
    pub exclusions: Vec<PackageRef>,
    pub partitions: Vec<ExtendedPartition>,
    pub deployed: Vec<DeployedArchive>,
    pub skipped: Vec<SkippedArchive>,
}

/// Drive a bundle run for one recipe.
#[derive(Debug)]
pub struct Bundler<M, U>
where
    M: PackageManager,
    U: Unpacker,
{
    recipe: BundleRecipe,
    classifier: Classifier,
    manager: M,
    unpacker: U,
    options: RunOptions,
}

impl<M, U> Bundler<M, U>
where
    M: PackageManager,
    U: Unpacker,
{
    /// Construct new bundler.
    pub fn new(recipe: BundleRecipe, manager: M, unpacker: U, options: RunOptions) -> Self {
        let classifier = Classifier::from_recipe(&recipe);
        Self {
            recipe,
            classifier,
            manager,
            unpacker,
            options,
        }
    }

    pub fn app_dir(&self) -> &Path {
        &self.recipe.settings.app_dir
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    /// Run every stage in order.
    ///
    /// # Errors
    ///
    /// - Return [`BundleError::Configuration`] if the package manager cannot
    ///   be configured or its state cannot be reset.
    /// - Return [`BundleError::Refresh`] if the package index refresh fails.
    /// - Return [`BundleError::Resolution`] if an install list cannot be
    ///   resolved.
    /// - Return [`BundleError::Install`] if packages cannot be downloaded.
    /// - Return [`BundleError::ReadCache`] if the archive directory cannot be
    ///   listed.
    /// - Return [`BundleError::Relink`] if an extracted link cannot be
    ///   rewritten.
    #[instrument(skip(self), level = "debug")]
    pub fn run(&self) -> Result<BundleReport> {
        self.prepare()?;
        let partitions = self.extend_partitions()?;
        let exclusions = self.classify()?;
        self.install(&exclusions)?;
        let (deployed, skipped) = self.extract_all(&partitions)?;

        info!(
            "bundled {} archives into {:?}, skipped {}",
            deployed.len(),
            self.app_dir().display(),
            skipped.len()
        );

        Ok(BundleReport {
            exclusions,
            partitions,
            deployed,
            skipped,
        })
    }

    /// Resolve include set and compute its exclusion list without
    /// downloading anything.
    ///
    /// # Errors
    ///
    /// - Return any error of the configure, refresh, reset, and classify
    ///   stages.
    pub fn exclusions(&self) -> Result<Vec<PackageRef>> {
        self.prepare()?;
        self.classify()
    }

    fn prepare(&self) -> Result<()> {
        self.manager
            .configure()
            .map_err(BundleError::Configuration)?;

        if self.options.refresh_index {
            self.manager.update().map_err(BundleError::Refresh)?;
        } else {
            info!("skip package index refresh");
        }

        self.manager
            .clear_installed_packages()
            .map_err(BundleError::Configuration)
    }

    /// Attach transitive requirements to every partition.
    #[instrument(skip(self), level = "debug")]
    pub fn extend_partitions(&self) -> Result<Vec<ExtendedPartition>> {
        Partition::from_recipe(&self.recipe)
            .into_iter()
            .map(|partition| -> Result<ExtendedPartition> {
                let resolved = self
                    .manager
                    .install_list(partition.seeds())
                    .map_err(BundleError::Resolution)?;
                let extended = partition.extend(resolved.into_iter().map(|package| package.name));
                info!(
                    "partition {} holds {} packages",
                    extended.name(),
                    extended.members().len()
                );

                Ok(extended)
            })
            .collect()
    }

    /// Compute exclusion list over the include set's install list.
    #[instrument(skip(self), level = "debug")]
    pub fn classify(&self) -> Result<Vec<PackageRef>> {
        let install_list = self
            .manager
            .install_list(&self.recipe.settings.include)
            .map_err(BundleError::Resolution)?;
        let exclusions = self.classifier.exclusion_list(&install_list);
        info!(
            "exclude {} of {} resolved packages",
            exclusions.len(),
            install_list.len()
        );

        Ok(exclusions)
    }

    fn install(&self, exclusions: &[PackageRef]) -> Result<()> {
        self.manager
            .set_installed_packages(exclusions)
            .map_err(BundleError::Configuration)?;
        self.manager
            .install(&self.recipe.settings.include)
            .map_err(BundleError::Install)
    }

    /// Extract every cached archive into its destination.
    #[instrument(skip(self, partitions), level = "debug")]
    pub fn extract_all(
        &self,
        partitions: &[ExtendedPartition],
    ) -> Result<(Vec<DeployedArchive>, Vec<SkippedArchive>)> {
        let app_dir = self.app_dir();
        let layout = PartitionLayout::new(app_dir, partitions);
        let archives = self.cached_archives()?;
        let bar = self.progress_bar(archives.len() as u64)?;

        let mut deployed = Vec::new();
        let mut skipped = Vec::new();
        for archive in archives {
            let file_name = archive
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            bar.set_message(file_name.clone());

            let package = match package_name_from_archive(&file_name) {
                Ok(package) => package,
                Err(error) => {
                    warn!("skip {file_name}: {error}");
                    skipped.push(SkippedArchive {
                        archive,
                        reason: error.to_string(),
                    });
                    bar.inc(1);
                    continue;
                }
            };

            let destination = layout.destination_for(&package);
            info!(
                "deploying {file_name} to {}",
                display_in_app_dir(app_dir, &destination)
            );

            let files = match extract(&self.unpacker, &archive, &destination) {
                Ok(files) => files,
                Err(error) => {
                    warn!("skip {file_name}: {error}");
                    skipped.push(SkippedArchive {
                        archive,
                        reason: error.to_string(),
                    });
                    bar.inc(1);
                    continue;
                }
            };

            let mut relinked = 0;
            for file in &files {
                if relativize(&destination, file)?.is_some() {
                    relinked += 1;
                }
            }

            deployed.push(DeployedArchive {
                archive,
                package,
                destination,
                files,
                relinked,
            });
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok((deployed, skipped))
    }

    /// List package archives in the cache, sorted by file name.
    fn cached_archives(&self) -> Result<Vec<PathBuf>> {
        let archives_path = self.manager.archives_path();
        let read_error = |err| BundleError::ReadCache {
            source: err,
            path: archives_path.clone(),
        };

        let mut archives = Vec::new();
        for entry in read_dir(&archives_path).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            if path.is_file() && is_deb_file(&path) {
                archives.push(path);
            }
        }
        archives.sort();

        Ok(archives)
    }

    fn progress_bar(&self, len: u64) -> Result<ProgressBar> {
        if !self.options.progress {
            return Ok(ProgressBar::hidden());
        }

        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {pos}/{len}",
        )?
        .progress_chars("-Cco.");
        let bar = ProgressBar::new(len);
        bar.set_style(style);

        Ok(bar)
    }
}

/// Bundle run error types.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// Package manager environment cannot be generated or reset.
    #[error("failed to configure package manager")]
    Configuration(#[source] AptError),

    /// Package index cannot be refreshed.
    #[error("failed to refresh package index")]
    Refresh(#[source] AptError),

    /// Install list cannot be resolved.
    #[error("failed to resolve install list")]
    Resolution(#[source] AptError),

    /// Packages cannot be downloaded into the package cache.
    #[error("failed to download packages")]
    Install(#[source] AptError),

    /// Package cache cannot be listed.
    #[error("failed to read package cache at {:?}", path.display())]
    ReadCache {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Extracted symbolic link cannot be rewritten.
    #[error(transparent)]
    Relink(#[from] RelinkError),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = BundleError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("APPDIR_BUNDLER_NO_UPDATE", "1")])]
    fn environment_disables_refresh() {
        assert!(!RunOptions::from_env(false).refresh_index);
    }

    #[sealed_test(env = [("APPDIR_BUNDLER_NO_UPDATE", "")])]
    fn empty_environment_value_keeps_refresh() {
        assert!(RunOptions::from_env(false).refresh_index);
    }

    #[sealed_test]
    fn flag_disables_refresh() {
        std::env::remove_var(NO_UPDATE_ENV);
        assert_eq!(
            RunOptions::from_env(true),
            RunOptions {
                refresh_index: false,
                progress: true,
            }
        );
    }
}
