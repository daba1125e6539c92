// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Assemble relocatable application directories from Debian packages.
//!
//! An __AppDir__ is a self-contained directory tree holding an application
//! together with the libraries and data files it needs at runtime. This crate
//! builds one from a __bundle recipe__ by resolving the recipe's packages
//! through apt, leaving out everything the target system already provides,
//! and extracting the remaining archives into the AppDir.
//!
//! # Portability
//!
//! Packages are built for installation at `/`, so their symbolic links tend
//! to point at absolute paths. Every absolute link extracted into the AppDir
//! is rewritten to a relative one, so the AppDir keeps working no matter
//! where it is moved to.
//!
//! # Partitions
//!
//! Some packages must not live in the AppDir's primary tree, e.g., a private
//! glibc that is only loaded when the host ships an older one. A recipe can
//! place such packages, together with everything they depend on, into
//! dedicated subdirectories called partitions.
//!
//! # See Also
//!
//! 1. [AppDir specification](https://docs.appimage.org/reference/appdir.html)
//! 2. [`Bundler`]

pub mod apt;
pub mod bundler;
pub mod classify;
pub mod config;
pub mod extract;
pub mod package;
pub mod partition;
pub mod path;
pub mod query;
pub mod relink;
pub mod syscall;

pub use apt::{AptEnv, AptGet, PackageManager};
pub use bundler::{BundleReport, Bundler, RunOptions};
pub use classify::{Classifier, Decision};
pub use config::BundleRecipe;
pub use extract::{DpkgDeb, Unpacker};
pub use package::PackageRef;
