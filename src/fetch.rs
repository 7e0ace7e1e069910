// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository fetching.
//!
//! Ensure a local clone of a remote repository exists at a fixed path, and
//! keep it current. A missing clone gets cloned, an existing clone gets its
//! current branch fast-forwarded to the remote. An existing clone that is
//! already up to date is left alone, so fetching twice in a row mutates
//! nothing the second time.
//!
//! Local history is never rewritten. A clone whose branch has diverged from
//! its remote is reported as an error instead of being reset, and the
//! working tree is updated with a safe checkout that refuses to clobber
//! local modifications.
//!
//! All network access goes through libgit2. If credentials are needed, the
//! user's git configuration is consulted first through
//! [`auth_git2::GitAuthenticator`], and the user is prompted as a last resort.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    Config, FetchOptions, RemoteCallbacks, Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument};

/// Repository that should have a local clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    /// Short name used in logs and reports.
    pub name: String,

    /// Remote URL to clone from.
    pub url: String,

    /// Path of the local clone.
    pub path: PathBuf,

    /// Branch to check out on initial clone. Remote default otherwise.
    pub branch: Option<String>,
}

/// Effect that fetching had on the local clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Clone did not exist and was created.
    Cloned,

    /// Clone was fast-forwarded to the remote.
    Updated,

    /// Clone already matched the remote.
    UpToDate,
}

impl Display for FetchOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Cloned => fmt.write_str("cloned"),
            Self::Updated => fmt.write_str("updated"),
            Self::UpToDate => fmt.write_str("up to date"),
        }
    }
}

/// Clone-or-update driver through libgit2.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fetcher {
    progress: bool,
}

impl Fetcher {
    /// Construct new fetcher.
    ///
    /// Transfer progress is drawn on a progress bar if `progress` is set.
    pub fn new(progress: bool) -> Self {
        Self { progress }
    }

    /// Ensure target repository is cloned and current.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::NotARepository`] if target path holds
    ///   something other than a repository.
    /// - Return [`FetchError::DetachedHead`] if the clone is not on a branch.
    /// - Return [`FetchError::Diverged`] if the clone cannot be
    ///   fast-forwarded.
    /// - Return [`FetchError::Git2`] if libgit2 operations fail, e.g., the
    ///   remote is unreachable or authentication fails.
    #[instrument(skip(self, target), fields(repo = %target.name), level = "debug")]
    pub fn fetch(&self, target: &RepoTarget) -> Result<FetchOutcome> {
        if is_missing_or_empty(&target.path) {
            self.clone_repo(target)?;
            return Ok(FetchOutcome::Cloned);
        }

        self.pull(target)
    }

    fn clone_repo(&self, target: &RepoTarget) -> Result<()> {
        info!("clone {} into {}", target.url, target.path.display());
        if let Some(parent) = target.path.parent() {
            let _ = mkdirp::mkdirp(parent).map_err(|err| FetchError::CreateDir {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        self.with_fetch_options(&target.name, |fo| {
            let mut builder = RepoBuilder::new();
            builder.fetch_options(fo);
            if let Some(branch) = &target.branch {
                builder.branch(branch);
            }
            builder.clone(&target.url, &target.path)?;
            Ok(())
        })
    }

    fn pull(&self, target: &RepoTarget) -> Result<FetchOutcome> {
        let repo = Repository::open(&target.path).map_err(|_| FetchError::NotARepository {
            path: target.path.clone(),
        })?;

        // INVARIANT: Only ever pull from the URL currently configured.
        let found = repo
            .find_remote("origin")?
            .url()
            .map(ToString::to_string)
            .unwrap_or_default();
        if !is_same_url(&found, &target.url) {
            return Err(FetchError::RemoteMismatch {
                path: target.path.clone(),
                expected: target.url.clone(),
                found,
            });
        }

        // INVARIANT: Resolve branch through symbolic HEAD, so unborn branches work too.
        let head = repo.find_reference("HEAD")?;
        let refname = head
            .symbolic_target()
            .filter(|name| name.starts_with("refs/heads/"))
            .map(ToString::to_string)
            .ok_or_else(|| FetchError::DetachedHead {
                path: target.path.clone(),
            })?;
        let branch = refname.trim_start_matches("refs/heads/").to_string();

        debug!("fetch {branch} of {}", target.name);
        self.with_fetch_options(&target.name, |mut fo| {
            let mut remote = repo.find_remote("origin")?;
            remote.fetch(&[branch.as_str()], Some(&mut fo), None)?;
            Ok(())
        })?;

        let fetch_head = repo.find_reference("FETCH_HEAD")?;
        let fetch_commit = repo.reference_to_annotated_commit(&fetch_head)?;
        let (analysis, _) = repo.merge_analysis(&[&fetch_commit])?;

        if analysis.is_up_to_date() {
            info!("{} is up to date", target.name);
            return Ok(FetchOutcome::UpToDate);
        }

        let message = format!("dotstrap: fast-forward {branch} to {}", fetch_commit.id());
        if analysis.is_unborn() {
            repo.reference(&refname, fetch_commit.id(), true, &message)?;
            repo.set_head(&refname)?;
            repo.checkout_head(Some(CheckoutBuilder::new().safe()))?;
            return Ok(FetchOutcome::Updated);
        }

        if !analysis.is_fast_forward() {
            return Err(FetchError::Diverged {
                path: target.path.clone(),
                branch,
            });
        }

        // INVARIANT: Check out new tree before moving the branch, so the safe
        // checkout compares against the tree currently in the work tree.
        info!("fast-forward {} to {}", target.name, fetch_commit.id());
        let object = repo.find_object(fetch_commit.id(), None)?;
        repo.checkout_tree(&object, Some(CheckoutBuilder::new().safe()))?;
        repo.find_reference(&refname)?
            .set_target(fetch_commit.id(), &message)?;
        repo.set_head(&refname)?;

        Ok(FetchOutcome::Updated)
    }

    fn with_fetch_options<T>(
        &self,
        label: &str,
        op: impl FnOnce(FetchOptions<'_>) -> Result<T>,
    ) -> Result<T> {
        let bar = self.progress_bar(label)?;
        let prompter = ProgressPrompter::new(bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let config = Config::open_default()?;

        let mut throttle = Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        let transfer_bar = bar.clone();
        rc.transfer_progress(move |progress| {
            if throttle.elapsed() > Duration::from_millis(10) {
                throttle = Instant::now();
                transfer_bar.set_length(progress.total_objects() as u64);
                transfer_bar.set_position(progress.received_objects() as u64);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let result = op(fo);
        bar.finish_and_clear();

        result
    }

    fn progress_bar(&self, label: &str) -> Result<ProgressBar> {
        if !self.progress {
            return Ok(ProgressBar::hidden());
        }

        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<30}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Ok(bar)
    }
}

fn is_same_url(lhs: &str, rhs: &str) -> bool {
    lhs.trim_end_matches('/') == rhs.trim_end_matches('/')
}

fn is_missing_or_empty(path: &Path) -> bool {
    match path.read_dir() {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => !path.exists(),
    }
}

/// Credential prompter that steps around an active progress bar.
///
/// Every prompt suspends the bar, so the question is never drawn over. A
/// cancelled prompt yields no credentials, which lets libgit2 fail the
/// transfer with its own authentication error.
#[derive(Debug, Clone)]
pub struct ProgressPrompter {
    bar: ProgressBar,
}

impl ProgressPrompter {
    /// Construct new prompter around target progress bar.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }

    fn ask_text(&self, label: &str) -> Option<String> {
        self.bar.suspend(|| Text::new(label).prompt().ok())
    }

    fn ask_secret(&self, label: &str) -> Option<String> {
        self.bar
            .suspend(|| Password::new(label).without_confirmation().prompt().ok())
    }
}

impl Prompter for ProgressPrompter {
    #[instrument(skip(self, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("{url} needs a username and password");
        let username = self.ask_text("username")?;
        let password = self.ask_secret(&format!("password for {username}"))?;

        Some((username, password))
    }

    #[instrument(skip(self, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("{url} needs a password");
        self.ask_secret(&format!("password for {username}"))
    }

    #[instrument(skip(self, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        let key = ssh_key_path.display().to_string();
        info!("{key} is locked");
        self.ask_secret(&format!("passphrase for {key}"))
    }
}

/// All possible error types for repository fetching.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Target path is occupied by something other than a repository.
    #[error("{path:?} exists but is not a git repository")]
    NotARepository { path: PathBuf },

    /// Clone tracks a different remote than the one configured.
    #[error("{path:?} tracks {found:?} instead of {expected:?}, move it away to clone again")]
    RemoteMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// Clone is not on a branch.
    #[error("{path:?} is not on a branch, cannot update")]
    DetachedHead { path: PathBuf },

    /// Local branch has commits the remote does not have.
    #[error("branch {branch:?} of {path:?} diverged from its remote, cannot fast-forward")]
    Diverged { path: PathBuf, branch: String },

    /// Parent directory of clone could not be created.
    #[error("failed to create directory {path:?}")]
    CreateDir {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
type Result<T, E = FetchError> = std::result::Result<T, E>;
