// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bootstrap sequence.
//!
//! Drive a machine from nothing to a converged workstation through a
//! strictly linear sequence of steps:
//!
//! 1. Install developer tools, Homebrew, and the playbook's dependencies.
//! 2. Clone or update the bootstrap repository.
//! 3. Clone or update the dotfiles repository, if one is configured.
//! 4. Run the top-level playbook, including whichever optional dotfiles
//!    files exist.
//!
//! Each step starts only after the previous one finished. No progress is
//! tracked between runs. Every step re-checks its own precondition instead,
//! which makes an interrupted run resumable by running it again.
//!
//! # Failure Handling
//!
//! Any failure is fatal, except one: the dotfiles repository is optional,
//! so failing to fetch it is logged and recorded, the dotfiles-dependent
//! optional steps are disabled, and the sequence carries on with the
//! mandatory bootstrap repository.
//!
//! # Update
//!
//! [`Bootstrap::update`] is an alternate entry point that only refreshes
//! installed packages. It never clones or fetches a repository.

pub mod report;

use crate::{
    config::Settings,
    fetch::{FetchError, FetchOutcome, Fetcher, RepoTarget},
    install::{InstallError, Installer},
    playbook::{OptionalStep, PlaybookError, PlaybookOptions, PlaybookRunner, PlaybookScope},
    probe::Prober,
    syscall::{Syscall, SystemSyscall},
};
use report::{BootstrapReport, CheckReport, Outcome, Step};

use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Name of the bootstrap repository in logs and reports.
pub const BOOTSTRAP_REPO: &str = "bootstrap";

/// Name of the dotfiles repository in logs and reports.
pub const DOTFILES_REPO: &str = "dotfiles";

/// Switches that alter how a run behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Switches forwarded to the playbook engine.
    pub playbook: PlaybookOptions,

    /// Draw progress bars while fetching repositories.
    pub progress: bool,
}

/// Bootstrap sequence over a set of settings.
pub struct Bootstrap<S = SystemSyscall>
where
    S: Syscall,
{
    settings: Settings,
    syscall: S,
    options: Options,
}

impl<S> Bootstrap<S>
where
    S: Syscall,
{
    /// Construct new bootstrap sequence.
    pub fn new(settings: Settings, syscall: S, options: Options) -> Self {
        Self {
            settings,
            syscall,
            options,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the whole bootstrap sequence.
    ///
    /// Repository work runs on the blocking thread pool, but each fetch is
    /// awaited before the next step begins.
    ///
    /// # Errors
    ///
    /// - Return [`BootstrapError::Install`] if a prerequisite cannot be
    ///   installed.
    /// - Return [`BootstrapError::Fetch`] if the bootstrap repository cannot
    ///   be cloned or updated.
    /// - Return [`BootstrapError::Playbook`] if the playbook fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn run(&self) -> Result<BootstrapReport> {
        let mut report = BootstrapReport::default();

        self.install(&mut report)?;

        let outcome = self.fetch(self.bootstrap_target()).await?;
        report.record(Step::Fetch(BOOTSTRAP_REPO.into()), outcome);

        let dotfiles_available = match self.dotfiles_target() {
            None => {
                info!("no dotfiles repository configured, skip dotfiles");
                report.record(Step::Fetch(DOTFILES_REPO.into()), Outcome::Skipped);
                false
            }
            Some(target) => match self.fetch(target).await {
                Ok(outcome) => {
                    report.record(Step::Fetch(DOTFILES_REPO.into()), outcome);
                    true
                }
                Err(error) => {
                    warn!("{error:?}");
                    warn!("continue without dotfiles");
                    report.record(
                        Step::Fetch(DOTFILES_REPO.into()),
                        Outcome::Failed(error.to_string()),
                    );
                    false
                }
            },
        };

        self.run_playbook(&mut report, PlaybookScope::Full, dotfiles_available)?;
        info!("bootstrap complete\n{report}");

        Ok(report)
    }

    /// Refresh installed packages only.
    ///
    /// Requires a previous bootstrap run to have left the top-level playbook
    /// in place. Repositories are neither cloned nor fetched.
    ///
    /// # Errors
    ///
    /// - Return [`BootstrapError::NotBootstrapped`] if the top-level playbook
    ///   is missing.
    /// - Return [`BootstrapError::Playbook`] if the playbook fails.
    #[instrument(skip(self), level = "debug")]
    pub fn update(&self) -> Result<BootstrapReport> {
        let playbook = self.settings.bootstrap.playbook_path();
        if !playbook.is_file() {
            return Err(BootstrapError::NotBootstrapped { path: playbook });
        }

        let mut report = BootstrapReport::default();
        let dotfiles_available =
            self.settings.dotfiles.is_enabled() && self.settings.dotfiles.home.is_dir();
        self.run_playbook(&mut report, PlaybookScope::Update, dotfiles_available)?;
        info!("update complete\n{report}");

        Ok(report)
    }

    /// Report the state of the machine without changing it.
    pub fn check(&self) -> CheckReport {
        let dotfiles = &self.settings.dotfiles;
        let dotfiles_present = dotfiles.home.is_dir();

        CheckReport {
            probe: Prober::new(&self.settings.packages).probe(),
            bootstrapped: self.settings.bootstrap.playbook_path().is_file(),
            dotfiles: dotfiles.is_enabled().then_some(dotfiles_present),
            optional: if dotfiles.is_enabled() && dotfiles_present {
                OptionalStep::discover(dotfiles)
            } else {
                Vec::new()
            },
        }
    }

    fn install(&self, report: &mut BootstrapReport) -> Result<()> {
        let changes = Installer::new(&self.settings.packages, &self.syscall).ensure_all()?;
        for (prereq, change) in changes {
            report.record(Step::Prerequisite(prereq), change);
        }

        Ok(())
    }

    fn run_playbook(
        &self,
        report: &mut BootstrapReport,
        scope: PlaybookScope,
        dotfiles_available: bool,
    ) -> Result<()> {
        let optional = if dotfiles_available {
            OptionalStep::discover(&self.settings.dotfiles)
        } else {
            Vec::new()
        };

        for step in OptionalStep::ALL.into_iter().filter(|step| step.in_scope(scope)) {
            let outcome = if optional.iter().any(|discovered| discovered.step == step) {
                Outcome::Delegated
            } else {
                Outcome::Skipped
            };
            report.record(Step::Optional(step), outcome);
        }

        PlaybookRunner::new(&self.settings, &self.syscall, self.options.playbook).run(
            &optional,
            scope,
            dotfiles_available,
        )?;
        report.record(Step::Playbook(scope), Outcome::Delegated);

        Ok(())
    }

    async fn fetch(&self, target: RepoTarget) -> Result<FetchOutcome> {
        let fetcher = Fetcher::new(self.options.progress);
        let repo = target.name.clone();
        let outcome = tokio::task::spawn_blocking(move || fetcher.fetch(&target))
            .await?
            .map_err(|err| BootstrapError::Fetch { repo, source: err })?;

        Ok(outcome)
    }

    fn bootstrap_target(&self) -> RepoTarget {
        let bootstrap = &self.settings.bootstrap;
        RepoTarget {
            name: BOOTSTRAP_REPO.into(),
            url: bootstrap.url.clone(),
            path: bootstrap.home.clone(),
            branch: bootstrap.branch.clone(),
        }
    }

    fn dotfiles_target(&self) -> Option<RepoTarget> {
        let dotfiles = &self.settings.dotfiles;
        dotfiles.url.as_ref().map(|url| RepoTarget {
            name: DOTFILES_REPO.into(),
            url: url.clone(),
            path: dotfiles.home.clone(),
            branch: dotfiles.branch.clone(),
        })
    }
}

/// All possible error types for a bootstrap run.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Prerequisite installation failed.
    #[error("failed to install prerequisites")]
    Install(#[from] InstallError),

    /// Mandatory repository could not be cloned or updated.
    #[error("failed to fetch {repo} repository")]
    Fetch { repo: String, source: FetchError },

    /// Playbook could not be run, or failed.
    #[error("failed to run playbook")]
    Playbook(#[from] PlaybookError),

    /// Update requested before any bootstrap run.
    #[error("{path:?} not found, run the bootstrap first")]
    NotBootstrapped { path: PathBuf },

    /// Blocking repository task panicked or was cancelled.
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Friendly result alias :3
type Result<T, E = BootstrapError> = std::result::Result<T, E>;
