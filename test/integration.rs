// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{write_archive, FakeApt, FixtureUnpacker};

use appdir_bundler::{
    bundler::{BundleError, SkippedArchive},
    BundleRecipe, Bundler, PackageRef, RunOptions,
};

use anyhow::Result;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    env::current_dir,
    fs::{read_link, read_to_string},
    path::{Path, PathBuf},
};

const QUIET: RunOptions = RunOptions {
    refresh_index: true,
    progress: false,
};

fn recipe(app_dir: &Path, include: &str) -> Result<BundleRecipe> {
    Ok(format!(
        r#"
        [settings]
        app_dir = "{}"
        arch = "amd64"
        include = ["{include}"]
        exclude = ["libpango*"]

        [partitions]
        "opt/libc" = ["libc6"]
        "#,
        app_dir.display()
    )
    .parse()?)
}

fn fake_apt(archives: &Path) -> FakeApt {
    FakeApt::new(archives)
        .with_closure(
            "vlc",
            [
                ("vlc", "3.0.9"),
                ("libvlc5", "3.0.9"),
                ("libc6", "2.31"),
                ("libpango-1.0-0", "1.44"),
                ("zlib1g", "1.2.11"),
            ],
        )
        .with_closure("libc6", [("libc6", "2.31"), ("libcrypt1", "4.4.10")])
}

fn populate_cache(archives: &Path) -> Result<()> {
    write_archive(
        archives,
        "vlc_3.0.9_amd64.deb",
        ["file usr/bin/vlc elf", "link usr/lib/libvlc.so /usr/lib/libvlc.so.5"],
    )?;
    write_archive(archives, "libvlc5_3.0.9_amd64.deb", ["file usr/lib/libvlc.so.5 elf"])?;
    write_archive(
        archives,
        "libc6_2.31_amd64.deb",
        [
            "file lib/x86_64-linux-gnu/ld-2.31.so elf",
            "link lib64/ld-linux-x86-64.so.2 /lib/x86_64-linux-gnu/ld-2.31.so",
        ],
    )?;
    write_archive(archives, "libcrypt1_4.4.10_amd64.deb", ["file lib/libcrypt.so.1 elf"])?;
    write_archive(archives, "broken_1.0_amd64.deb", ["fail"])?;
    write_archive(archives, "bogus.deb", ["file usr/bin/bogus elf"])?;
    write_archive(archives, "libfoo_1.0_.deb", ["file usr/lib/libfoo.so.1 elf"])?;
    write_archive(archives, "lock", [""])?;

    Ok(())
}

#[sealed_test]
fn bundle_full_run() -> Result<()> {
    let cwd = current_dir()?;
    let app_dir = cwd.join("AppDir");
    let archives = cwd.join("cache/archives");
    populate_cache(&archives)?;

    let bundler = Bundler::new(
        recipe(&app_dir, "vlc")?,
        fake_apt(&archives),
        FixtureUnpacker,
        QUIET,
    );
    let report = bundler.run()?;

    assert_eq!(
        report.exclusions,
        vec![
            PackageRef::new("libc6", "2.31", "amd64"),
            PackageRef::new("libpango-1.0-0", "1.44", "amd64"),
            PackageRef::new("zlib1g", "1.2.11", "amd64"),
        ]
    );

    let deployed = report
        .deployed
        .iter()
        .map(|archive| (archive.package.as_str(), archive.destination.clone()))
        .collect::<Vec<_>>();
    assert_eq!(
        deployed,
        vec![
            ("libc6", app_dir.join("opt/libc")),
            ("libcrypt1", app_dir.join("opt/libc")),
            ("libvlc5", app_dir.clone()),
            ("vlc", app_dir.clone()),
        ]
    );

    let skipped = report
        .skipped
        .iter()
        .map(|SkippedArchive { archive, .. }| archive.clone())
        .collect::<Vec<_>>();
    assert_eq!(
        skipped,
        vec![
            archives.join("bogus.deb"),
            archives.join("broken_1.0_amd64.deb"),
            archives.join("libfoo_1.0_.deb"),
        ]
    );

    assert_eq!(read_to_string(app_dir.join("usr/bin/vlc"))?, "elf");
    assert_eq!(read_link(app_dir.join("usr/lib/libvlc.so"))?, PathBuf::from("libvlc.so.5"));
    assert_eq!(read_to_string(app_dir.join("usr/lib/libvlc.so"))?, "elf");
    assert_eq!(
        read_link(app_dir.join("opt/libc/lib64/ld-linux-x86-64.so.2"))?,
        PathBuf::from("../lib/x86_64-linux-gnu/ld-2.31.so")
    );
    assert_eq!(read_to_string(app_dir.join("opt/libc/lib/libcrypt.so.1"))?, "elf");
    assert!(!app_dir.join("usr/bin/bogus").exists());
    assert!(!app_dir.join("usr/lib/libfoo.so.1").exists());

    Ok(())
}

#[sealed_test]
fn partitions_keep_seeds_first() -> Result<()> {
    let cwd = current_dir()?;
    let archives = cwd.join("cache/archives");
    populate_cache(&archives)?;

    let bundler = Bundler::new(
        recipe(&cwd.join("AppDir"), "vlc")?,
        fake_apt(&archives),
        FixtureUnpacker,
        QUIET,
    );
    let report = bundler.run()?;

    assert_eq!(report.partitions.len(), 1);
    assert_eq!(report.partitions[0].seeds(), ["libc6"]);
    assert_eq!(report.partitions[0].members(), ["libc6", "libcrypt1"]);

    Ok(())
}

#[sealed_test]
fn bundle_stages_run_in_order() -> Result<()> {
    let cwd = current_dir()?;
    let archives = cwd.join("cache/archives");
    populate_cache(&archives)?;

    let options = RunOptions {
        refresh_index: false,
        progress: false,
    };
    let bundler = Bundler::new(
        recipe(&cwd.join("AppDir"), "vlc")?,
        fake_apt(&archives),
        FixtureUnpacker,
        options,
    );
    let report = bundler.run()?;
    let manager = bundler.manager();

    assert_eq!(
        *manager.calls.borrow(),
        vec![
            "configure",
            "clear",
            "install_list libc6",
            "install_list vlc",
            "set_installed",
            "install vlc",
        ]
    );
    assert_eq!(*manager.installed.borrow(), report.exclusions);

    Ok(())
}

#[sealed_test]
fn failed_install_aborts_before_extraction() -> Result<()> {
    let cwd = current_dir()?;
    let app_dir = cwd.join("AppDir");
    let archives = cwd.join("cache/archives");
    populate_cache(&archives)?;

    let bundler = Bundler::new(
        recipe(&app_dir, "vlc")?,
        fake_apt(&archives).failing_install(),
        FixtureUnpacker,
        QUIET,
    );

    assert!(matches!(bundler.run(), Err(BundleError::Install(_))));
    assert!(!app_dir.exists());

    Ok(())
}

#[sealed_test]
fn unknown_package_is_a_resolution_error() -> Result<()> {
    let cwd = current_dir()?;
    let app_dir = cwd.join("AppDir");
    let archives = cwd.join("cache/archives");

    let bundler = Bundler::new(
        recipe(&app_dir, "no-such-package")?,
        fake_apt(&archives),
        FixtureUnpacker,
        QUIET,
    );

    assert!(matches!(bundler.run(), Err(BundleError::Resolution(_))));

    Ok(())
}

#[sealed_test]
fn exclusions_do_not_download() -> Result<()> {
    let cwd = current_dir()?;
    let archives = cwd.join("cache/archives");
    let bundler = Bundler::new(
        recipe(&cwd.join("AppDir"), "vlc")?,
        fake_apt(&archives),
        FixtureUnpacker,
        QUIET,
    );
    let exclusions = bundler.exclusions()?;

    assert_eq!(exclusions.len(), 3);
    assert!(!bundler
        .manager()
        .calls
        .borrow()
        .iter()
        .any(|call| call.starts_with("install ") || call == "set_installed"));

    Ok(())
}
