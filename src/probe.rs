// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Environment probing.
//!
//! Determine which prerequisites of the bootstrap sequence are already
//! present on the machine. Every check is a plain filesystem presence check,
//! so probing never spawns an external program and never mutates anything.
//!
//! Checks are evaluated independently of one another. A machine left in an
//! inconsistent state by an interrupted run, e.g., Homebrew present but the
//! developer tools missing, is therefore reported accurately instead of
//! being assumed complete after the first satisfied check.

use crate::config::PackageSettings;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Something that must exist before the playbook can run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Prerequisite {
    /// Command-line developer tools, i.e., compiler and git.
    DeveloperTools,

    /// The Homebrew package manager itself.
    PackageManager,

    /// Homebrew tap given as `user/repo`.
    Tap(String),

    /// Homebrew formula.
    Formula(String),
}

impl Display for Prerequisite {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        // Use pad so width and alignment flags apply in reports.
        match self {
            Self::DeveloperTools => fmt.pad("developer tools"),
            Self::PackageManager => fmt.pad("homebrew"),
            Self::Tap(name) => fmt.pad(&format!("tap {name}")),
            Self::Formula(name) => fmt.pad(&format!("formula {name}")),
        }
    }
}

/// Result of probing every prerequisite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Probe {
    pub checks: Vec<(Prerequisite, bool)>,
}

impl Probe {
    /// List prerequisites that are absent.
    pub fn missing(&self) -> Vec<&Prerequisite> {
        self.checks
            .iter()
            .filter(|(_, present)| !present)
            .map(|(prereq, _)| prereq)
            .collect()
    }

    /// Check if every prerequisite is present.
    pub fn is_satisfied(&self) -> bool {
        self.checks.iter().all(|(_, present)| *present)
    }
}

impl Display for Probe {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (prereq, present) in &self.checks {
            let mark = if *present { "present" } else { "missing" };
            writeln!(fmt, "{prereq:<32} {mark}")?;
        }

        Ok(())
    }
}

/// Filesystem prober for bootstrap prerequisites.
#[derive(Debug, Clone)]
pub struct Prober<'a> {
    packages: &'a PackageSettings,
}

impl<'a> Prober<'a> {
    /// Construct new prober over target package settings.
    pub fn new(packages: &'a PackageSettings) -> Self {
        Self { packages }
    }

    /// Every prerequisite in installation order.
    ///
    /// Developer tools come first, because Homebrew needs them, then the
    /// package manager, then the taps and formulae it installs.
    pub fn prerequisites(&self) -> Vec<Prerequisite> {
        let mut prereqs = vec![Prerequisite::DeveloperTools, Prerequisite::PackageManager];
        prereqs.extend(self.packages.taps.iter().cloned().map(Prerequisite::Tap));
        prereqs.extend(
            self.packages
                .formulae
                .iter()
                .cloned()
                .map(Prerequisite::Formula),
        );
        prereqs
    }

    /// Probe every prerequisite without short-circuiting.
    #[instrument(skip(self), level = "debug")]
    pub fn probe(&self) -> Probe {
        let checks = self
            .prerequisites()
            .into_iter()
            .map(|prereq| {
                let present = self.is_present(&prereq);
                (prereq, present)
            })
            .collect();

        Probe { checks }
    }

    /// Check if a single prerequisite is present.
    pub fn is_present(&self, prereq: &Prerequisite) -> bool {
        let present = match prereq {
            Prerequisite::DeveloperTools => self.packages.developer_tools.exists(),
            Prerequisite::PackageManager => self.packages.bin("brew").is_file(),
            Prerequisite::Tap(name) => self.tap_path(name).is_some_and(|path| path.is_dir()),
            Prerequisite::Formula(name) => is_non_empty_dir(&self.cellar_path(name)),
        };
        debug!("{prereq} present: {present}");

        present
    }

    /// Directory holding installed versions of target formula.
    pub fn cellar_path(&self, formula: &str) -> PathBuf {
        self.packages.prefix().join("Cellar").join(formula)
    }

    /// Directory holding target tap, if tap name is well formed.
    pub fn tap_path(&self, tap: &str) -> Option<PathBuf> {
        let (user, repo) = tap.split_once('/')?;
        if user.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }

        Some(
            self.packages
                .prefix()
                .join("Library")
                .join("Taps")
                .join(user)
                .join(format!("homebrew-{repo}")),
        )
    }
}

fn is_non_empty_dir(path: &Path) -> bool {
    path.read_dir()
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
