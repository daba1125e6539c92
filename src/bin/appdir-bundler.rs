// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use appdir_bundler::{
    package::package_name_from_archive, query::DpkgQuery, AptEnv, AptGet, BundleRecipe, Bundler,
    DpkgDeb, RunOptions,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  appdir-bundler [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Bundle(opts) => run_bundle(opts),
            Command::Exclusions(opts) => run_exclusions(opts),
            Command::ArchiveName(opts) => run_archive_name(opts),
            Command::Owners(opts) => run_owners(opts),
            Command::DeployHost(opts) => run_deploy_host(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Resolve, download, and extract recipe packages into its AppDir.
    #[command(override_usage = "appdir-bundler bundle [options] <recipe>")]
    Bundle(BundleOptions),

    /// Print packages of a recipe that are left out of the AppDir.
    #[command(override_usage = "appdir-bundler exclusions [options] <recipe>")]
    Exclusions(ExclusionsOptions),

    /// Print owning package name of archive files.
    #[command(override_usage = "appdir-bundler archive-name <file>...")]
    ArchiveName(ArchiveNameOptions),

    /// Print host packages owning target paths.
    #[command(override_usage = "appdir-bundler owners <path>...")]
    Owners(OwnersOptions),

    /// Copy files of installed host packages into an AppDir.
    #[command(override_usage = "appdir-bundler deploy-host <app_dir> <package>...")]
    DeployHost(DeployHostOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BundleOptions {
    /// Path to bundle recipe.
    #[arg(required = true, value_name = "recipe")]
    pub recipe: PathBuf,

    /// Use package index as is instead of refreshing it.
    #[arg(short, long)]
    pub no_update: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ExclusionsOptions {
    /// Path to bundle recipe.
    #[arg(required = true, value_name = "recipe")]
    pub recipe: PathBuf,

    /// Use package index as is instead of refreshing it.
    #[arg(short, long)]
    pub no_update: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ArchiveNameOptions {
    /// Archive file names to parse.
    #[arg(required = true, value_name = "file")]
    pub files: Vec<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct OwnersOptions {
    /// Host paths to look up.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeployHostOptions {
    /// AppDir to deploy into.
    #[arg(required = true, value_name = "app_dir")]
    pub app_dir: PathBuf,

    /// Installed host packages to deploy.
    #[arg(required = true, value_name = "package")]
    pub packages: Vec<String>,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn open_bundler(recipe: PathBuf, no_update: bool) -> Result<Bundler<AptGet, DpkgDeb>> {
    let recipe = BundleRecipe::load(recipe)?;
    let manager = AptGet::new(AptEnv::from_recipe(&recipe)?);

    Ok(Bundler::new(
        recipe,
        manager,
        DpkgDeb::new(),
        RunOptions::from_env(no_update),
    ))
}

fn run_bundle(opts: BundleOptions) -> Result<()> {
    let bundler = open_bundler(opts.recipe, opts.no_update)?;
    let report = bundler.run()?;

    for skipped in &report.skipped {
        info!("skipped {}: {}", skipped.archive.display(), skipped.reason);
    }

    Ok(())
}

fn run_exclusions(opts: ExclusionsOptions) -> Result<()> {
    let bundler = open_bundler(opts.recipe, opts.no_update)?;
    for package in bundler.exclusions()? {
        println!("{package}");
    }

    Ok(())
}

fn run_archive_name(opts: ArchiveNameOptions) -> Result<()> {
    for file in opts.files {
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("{}", package_name_from_archive(&file_name)?);
    }

    Ok(())
}

fn run_owners(opts: OwnersOptions) -> Result<()> {
    let query = DpkgQuery::new();
    for path in opts.paths {
        let owners = query.find_owner_packages(&path)?;
        let owners = owners.into_iter().collect::<Vec<_>>().join(", ");
        println!("{}: {owners}", path.display());
    }

    Ok(())
}

fn run_deploy_host(opts: DeployHostOptions) -> Result<()> {
    let query = DpkgQuery::new();
    let deployed = query.deploy_packages(&opts.packages, &opts.app_dir)?;
    info!("deployed {} host files", deployed.len());

    Ok(())
}
