// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package classification.
//!
//! Decide which packages of a resolved install list must stay out of the
//! bundle. Classification is driven by three __rule groups__ of shell glob
//! patterns, always evaluated in the same order:
//!
//! 1. Include overrides: the packages the recipe explicitly asks for.
//! 2. System exclusions: packages every target system already provides,
//!    e.g., base OS tools, fontconfig, X11 client libraries, the graphics
//!    stack, glibc, and whatever the runtime generator ships on its own.
//! 3. Caller exclusions: extra patterns listed in the recipe.
//!
//! The first group with a matching pattern decides. A package matching no
//! group at all is included. The order is fixed by [`Classifier::new`].
//!
//! Patterns use [`glob::Pattern`] semantics against the full package name.
//! Empty patterns are dropped, and patterns that fail to compile never
//! match anything.

use crate::{config::BundleRecipe, package::PackageRef};

use glob::Pattern;
use tracing::debug;

/// Packages of the base operating system.
pub const CORE_PACKAGES: &[&str] = &[
    "util-linux",
    "coreutils",
    "adduser",
    "avahi-daemon",
    "base-files",
    "bind9-host",
    "consolekit",
    "dbus",
    "debconf",
    "dpkg",
    "lsb-base",
    "libcap2-bin",
    "libinput-bin",
    "multiarch-support",
    "passwd",
    "systemd",
    "systemd-sysv",
    "ucf",
    "iso-codes",
    "shared-mime-info",
    "mount",
    "xdg-user-dirs",
    "sysvinit-utils",
    "debianutils",
    "init-system-helpers",
    "libpam-runtime",
    "libpam-modules-bin",
];

pub const FONTCONFIG_PACKAGES: &[&str] = &[
    "libfontconfig*",
    "fontconfig",
    "fontconfig-config",
    "libfreetype*",
];

pub const XCLIENT_PACKAGES: &[&str] = &[
    "x11-common",
    "libx11-*",
    "libxcb1",
    "libxcb-shape0",
    "libxcb-randr0",
    "libxcb-shm0",
    "libxcb-glx0",
    "libxcb-xfixes0",
    "libxcb-present0",
    "libxcb-render0",
    "libxcb-dri2-0",
    "libxcb-dri3-0",
];

/// Graphics drivers must match the host kernel, so they are never bundled.
pub const GRAPHICS_STACK_PACKAGES: &[&str] = &[
    "libgl1",
    "libgl1*",
    "libgl1-*",
    "libdrm*",
    "libegl1*",
    "libegl1-*",
    "libglapi*",
    "libgles2*",
    "libgbm*",
    "mesa-*",
];

pub const GLIBC_PACKAGES: &[&str] = &["libc6", "zlib1g", "libstdc++6"];

/// Outcome of classifying one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Included,
    Excluded,
}

/// Kind of rule group, listed in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleGroupKind {
    IncludeOverride,
    System,
    Caller,
}

impl RuleGroupKind {
    fn decision(self) -> Decision {
        match self {
            Self::IncludeOverride => Decision::Included,
            Self::System | Self::Caller => Decision::Excluded,
        }
    }
}

/// Compiled listing of package name patterns.
#[derive(Debug, Clone)]
pub struct RuleGroup {
    kind: RuleGroupKind,
    patterns: Vec<Pattern>,
}

impl RuleGroup {
    /// Compile pattern listing into a rule group.
    ///
    /// Empty patterns are skipped. Patterns that are not valid globs are
    /// logged and skipped.
    pub fn new(kind: RuleGroupKind, patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let patterns = patterns
            .into_iter()
            .filter(|pattern| !pattern.as_ref().is_empty())
            .filter_map(|pattern| match Pattern::new(pattern.as_ref()) {
                Ok(pattern) => Some(pattern),
                Err(error) => {
                    debug!("skip {kind:?} pattern {:?}: {error}", pattern.as_ref());
                    None
                }
            })
            .collect();

        Self { kind, patterns }
    }

    /// Check if any pattern matches the full package name.
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(name))
    }
}

/// Decide package exclusion through ordered rule groups.
#[derive(Debug, Clone)]
pub struct Classifier {
    groups: [RuleGroup; 3],
}

impl Classifier {
    /// Construct new classifier.
    ///
    /// Groups are evaluated as include overrides, then system exclusions,
    /// then caller exclusions.
    pub fn new(
        include: impl IntoIterator<Item = impl AsRef<str>>,
        system: impl IntoIterator<Item = impl AsRef<str>>,
        caller: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        Self {
            groups: [
                RuleGroup::new(RuleGroupKind::IncludeOverride, include),
                RuleGroup::new(RuleGroupKind::System, system),
                RuleGroup::new(RuleGroupKind::Caller, caller),
            ],
        }
    }

    /// Construct classifier from recipe settings and built-in exclusions.
    pub fn from_recipe(recipe: &BundleRecipe) -> Self {
        let settings = &recipe.settings;
        Self::new(
            &settings.include,
            system_exclusions(settings.apprun.provided_packages()),
            &settings.exclude,
        )
    }

    /// Classify a package by name.
    pub fn classify(&self, name: &str) -> Decision {
        self.groups
            .iter()
            .find(|group| group.matches(name))
            .map(|group| group.kind.decision())
            .unwrap_or(Decision::Included)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.classify(name) == Decision::Excluded
    }

    /// Select every package of an install list that must not be installed.
    ///
    /// Keeps the order of the install list.
    pub fn exclusion_list(&self, install_list: &[PackageRef]) -> Vec<PackageRef> {
        install_list
            .iter()
            .filter(|package| self.is_excluded(&package.name))
            .cloned()
            .collect()
    }
}

/// Built-in exclusion patterns plus packages provided by the runtime.
pub fn system_exclusions(runtime_packages: &[&'static str]) -> Vec<&'static str> {
    [
        CORE_PACKAGES,
        FONTCONFIG_PACKAGES,
        XCLIENT_PACKAGES,
        GRAPHICS_STACK_PACKAGES,
        GLIBC_PACKAGES,
        runtime_packages,
    ]
    .concat()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppRun;
    use simple_test_case::test_case;

    const NONE: [&str; 0] = [];

    #[test]
    fn include_override_wins_over_caller_exclusion() {
        let classifier = Classifier::new(["*"], NONE, ["libfoo"]);
        pretty_assertions::assert_eq!(classifier.classify("libfoo"), Decision::Included);
    }

    #[test]
    fn include_override_wins_over_system_exclusion() {
        let classifier = Classifier::new(["libc6"], GLIBC_PACKAGES.iter().copied(), NONE);
        pretty_assertions::assert_eq!(classifier.classify("libc6"), Decision::Included);
        pretty_assertions::assert_eq!(classifier.classify("zlib1g"), Decision::Excluded);
    }

    #[test_case("libgl1-mesa-dri", Decision::Excluded; "system glob")]
    #[test_case("libfontconfig1", Decision::Excluded; "fontconfig glob")]
    #[test_case("libpango-1.0-0", Decision::Excluded; "caller glob")]
    #[test_case("libvlc5", Decision::Included; "no match")]
    #[test_case("Libgl1", Decision::Included; "case sensitive")]
    #[test_case("xlibgl1", Decision::Included; "anchored at start")]
    #[test]
    fn classify_by_rule_groups(name: &str, expect: Decision) {
        let classifier = Classifier::new(
            ["vlc"],
            system_exclusions(AppRun::Wrapper.provided_packages()),
            ["libpango*"],
        );
        pretty_assertions::assert_eq!(classifier.classify(name), expect);
    }

    #[test]
    fn empty_patterns_never_match() {
        let classifier = Classifier::new([""], [""], [""]);
        pretty_assertions::assert_eq!(classifier.classify(""), Decision::Included);
        pretty_assertions::assert_eq!(classifier.classify("libfoo"), Decision::Included);

        let classifier = Classifier::new([""], NONE, ["libfoo"]);
        pretty_assertions::assert_eq!(classifier.classify("libfoo"), Decision::Excluded);
    }

    #[test]
    fn malformed_patterns_never_match() {
        let classifier = Classifier::new(NONE, NONE, ["libfoo**"]);
        pretty_assertions::assert_eq!(classifier.classify("libfoobar"), Decision::Included);
    }

    #[test]
    fn character_classes_and_single_wildcards() {
        let classifier = Classifier::new(NONE, NONE, ["libssl1.[01]", "libz?"]);
        assert!(classifier.is_excluded("libssl1.1"));
        assert!(!classifier.is_excluded("libssl3"));
        assert!(classifier.is_excluded("libz1"));
        assert!(!classifier.is_excluded("libz12"));
    }

    #[test_case(AppRun::Classic, "coreutils", true; "classic ships coreutils")]
    #[test_case(AppRun::Proot, "proot", true; "proot ships proot")]
    #[test_case(AppRun::Classic, "proot", false; "classic lacks proot")]
    #[test]
    fn runtime_generator_packages_are_excluded(apprun: AppRun, name: &str, expect: bool) {
        let classifier = Classifier::new(NONE, system_exclusions(apprun.provided_packages()), NONE);
        pretty_assertions::assert_eq!(classifier.is_excluded(name), expect);
    }

    #[test]
    fn exclusion_list_keeps_install_order() {
        let classifier = Classifier::new(["vlc"], GLIBC_PACKAGES.iter().copied(), ["libpango*"]);
        let install_list = vec![
            PackageRef::new("libc6", "2.31", "amd64"),
            PackageRef::new("vlc", "3.0.9", "amd64"),
            PackageRef::new("libpango-1.0-0", "1.44", "amd64"),
            PackageRef::new("libvlc5", "3.0.9", "amd64"),
        ];

        let result = classifier.exclusion_list(&install_list);
        let expect = vec![
            PackageRef::new("libc6", "2.31", "amd64"),
            PackageRef::new("libpango-1.0-0", "1.44", "amd64"),
        ];
        pretty_assertions::assert_eq!(result, expect);
    }
}
