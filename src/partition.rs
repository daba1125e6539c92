// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bundle partitions.
//!
//! A __partition__ is a subdirectory of the bundle reserved for a subset of
//! packages, e.g., a private copy of glibc that the runtime only loads on
//! hosts with an older one. The recipe names each partition together with
//! its seed packages. Before anything is extracted, the seeds are extended
//! with everything they transitively require, so that the whole dependency
//! closure of a partition lands in the same subtree.
//!
//! Seeds are immutable. Extension produces a separate [`ExtendedPartition`]
//! that keeps the seeds in their original order, and only ever appends
//! newly resolved names after them.

use crate::config::BundleRecipe;

use std::path::{Path, PathBuf};

/// Partition as listed by the recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    name: String,
    seeds: Vec<String>,
}

impl Partition {
    /// Construct new partition.
    pub fn new(name: impl Into<String>, seeds: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            seeds: seeds.into_iter().map(Into::into).collect(),
        }
    }

    /// Collect partitions of a recipe, in partition name order.
    pub fn from_recipe(recipe: &BundleRecipe) -> Vec<Self> {
        recipe
            .partitions
            .iter()
            .map(|(name, seeds)| Self::new(name, seeds))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seeds(&self) -> &[String] {
        &self.seeds
    }

    /// Attach resolved package names to the seeds.
    ///
    /// Names already present are not appended twice.
    pub fn extend(&self, resolved: impl IntoIterator<Item = impl Into<String>>) -> ExtendedPartition {
        let mut members = self.seeds.clone();
        for name in resolved.into_iter().map(Into::into) {
            if !members.contains(&name) {
                members.push(name);
            }
        }

        ExtendedPartition {
            partition: self.clone(),
            members,
        }
    }
}

/// Partition whose seeds have been extended with their requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedPartition {
    partition: Partition,
    members: Vec<String>,
}

impl ExtendedPartition {
    pub fn name(&self) -> &str {
        self.partition.name()
    }

    pub fn seeds(&self) -> &[String] {
        self.partition.seeds()
    }

    /// Seeds followed by every resolved requirement.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn contains(&self, package: &str) -> bool {
        self.members.iter().any(|member| member == package)
    }
}

/// Placement of packages inside the bundle.
#[derive(Debug, Clone)]
pub struct PartitionLayout<'a> {
    app_dir: &'a Path,
    partitions: &'a [ExtendedPartition],
}

impl<'a> PartitionLayout<'a> {
    pub fn new(app_dir: &'a Path, partitions: &'a [ExtendedPartition]) -> Self {
        Self {
            app_dir,
            partitions,
        }
    }

    /// Directory that a package's archive is extracted into.
    ///
    /// The first partition containing the package wins. Packages outside of
    /// every partition go to the bundle root.
    pub fn destination_for(&self, package: &str) -> PathBuf {
        self.partitions
            .iter()
            .find(|partition| partition.contains(package))
            .map(|partition| self.app_dir.join(partition.name()))
            .unwrap_or_else(|| self.app_dir.to_path_buf())
    }
}
