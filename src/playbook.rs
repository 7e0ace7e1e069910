// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Playbook execution.
//!
//! Hand the actual convergence of the workstation to Ansible. The bootstrap
//! repository carries a fixed top-level playbook that updates Homebrew and
//! applies the user's package manifest, after which the user's own
//! playbook runs, if the dotfiles repository provides one.
//!
//! # Optional Steps
//!
//! The dotfiles repository may provide two optional files: a user playbook
//! and a package manifest (a `Brewfile`). Each is an [`OptionalStep`]. Their
//! presence is checked on every run, and only the files that exist are used.
//! The manifest is passed to the top-level playbook as an extra variable.
//! The user playbook is a playbook in its own right, so it gets its own
//! `ansible-playbook` invocation right after the top-level one. A file added
//! later is simply picked up by the next run, with no other change needed.
//!
//! # Scope
//!
//! A [`PlaybookScope::Full`] run executes everything. A
//! [`PlaybookScope::Update`] run limits Ansible to the tasks tagged `update`,
//! i.e., refreshing Homebrew and the packages it manages.

use crate::{
    config::{DotfilesSettings, Settings},
    syscall::{Call, Syscall, SyscallError},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Tag selecting package-update tasks in the top-level playbook.
pub const UPDATE_TAG: &str = "update";

/// Optional file supplied by the dotfiles repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionalStep {
    /// Additional tasks applied after the baseline.
    UserPlaybook,

    /// Package manifest applied with `brew bundle`.
    PackageManifest,
}

impl OptionalStep {
    /// Every optional step, in the order they are applied.
    pub const ALL: [OptionalStep; 2] = [Self::UserPlaybook, Self::PackageManifest];

    /// Location of the step's file relative to dotfiles home.
    pub fn relative_path(self, dotfiles: &DotfilesSettings) -> &Path {
        match self {
            Self::UserPlaybook => &dotfiles.playbook,
            Self::PackageManifest => &dotfiles.manifest,
        }
    }

    /// Name of the extra variable the top-level playbook reads, if the
    /// step is handed to the top-level playbook at all.
    pub fn extra_var(self) -> Option<&'static str> {
        match self {
            Self::UserPlaybook => None,
            Self::PackageManifest => Some("package_manifest"),
        }
    }

    /// Check if step takes part in target scope.
    pub fn in_scope(self, scope: PlaybookScope) -> bool {
        match scope {
            PlaybookScope::Full => true,
            PlaybookScope::Update => self == Self::PackageManifest,
        }
    }

    /// Find optional steps whose file exists right now.
    pub fn discover(dotfiles: &DotfilesSettings) -> Vec<Discovered> {
        Self::ALL
            .into_iter()
            .filter_map(|step| {
                let path = dotfiles.home.join(step.relative_path(dotfiles));
                path.is_file().then_some(Discovered { step, path })
            })
            .collect()
    }
}

impl Display for OptionalStep {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::UserPlaybook => fmt.pad("user playbook"),
            Self::PackageManifest => fmt.pad("package manifest"),
        }
    }
}

/// Optional step together with the file that enabled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub step: OptionalStep,
    pub path: PathBuf,
}

/// Portion of the top-level playbook to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybookScope {
    /// Everything.
    Full,

    /// Package-update tasks only.
    Update,
}

/// Extra switches forwarded to Ansible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybookOptions {
    /// Prompt for the privilege escalation password.
    pub ask_become_pass: bool,

    /// Dry-run, report what would change without changing it.
    pub check: bool,
}

/// Runner of the top-level playbook.
pub struct PlaybookRunner<'a, S>
where
    S: Syscall,
{
    settings: &'a Settings,
    syscall: S,
    options: PlaybookOptions,
}

impl<'a, S> PlaybookRunner<'a, S>
where
    S: Syscall,
{
    /// Construct new playbook runner.
    pub fn new(settings: &'a Settings, syscall: S, options: PlaybookOptions) -> Self {
        Self {
            settings,
            syscall,
            options,
        }
    }

    /// Build the Ansible invocation of the top-level playbook for target
    /// scope.
    ///
    /// Optional steps out of scope are dropped. Dotfiles home is only
    /// exposed to the playbook when `dotfiles_available` is set.
    ///
    /// # Errors
    ///
    /// - Return [`PlaybookError::MissingPlaybook`] if the top-level playbook
    ///   does not exist.
    pub fn invocation(
        &self,
        optional: &[Discovered],
        scope: PlaybookScope,
        dotfiles_available: bool,
    ) -> Result<Call> {
        let playbook = self.settings.bootstrap.playbook_path();
        if !playbook.is_file() {
            return Err(PlaybookError::MissingPlaybook { path: playbook });
        }

        let mut call = self
            .engine_call(&playbook)
            .current_dir(&self.settings.bootstrap.home);

        if dotfiles_available {
            call = call.args(extra_var("dotfiles_home", &self.settings.dotfiles.home));
        }

        for discovered in optional.iter().filter(|d| d.step.in_scope(scope)) {
            if let Some(name) = discovered.step.extra_var() {
                call = call.args(extra_var(name, &discovered.path));
            }
        }

        if scope == PlaybookScope::Update {
            call = call.args(["--tags", UPDATE_TAG]);
        }

        Ok(self.with_switches(call))
    }

    /// Build the Ansible invocation of the user's own playbook.
    ///
    /// Runs from within dotfiles home, so the playbook can refer to files
    /// of the dotfiles repository by relative path.
    pub fn user_invocation(&self, playbook: &Path) -> Call {
        let call = self
            .engine_call(playbook)
            .args(extra_var("dotfiles_home", &self.settings.dotfiles.home))
            .current_dir(&self.settings.dotfiles.home);

        self.with_switches(call)
    }

    fn engine_call(&self, playbook: &Path) -> Call {
        Call::new(self.settings.packages.bin("ansible-playbook"))
            .arg(playbook)
            .args(["--inventory", "localhost,", "--connection", "local"])
            .args(extra_var("dotstrap_home", &self.settings.bootstrap.home))
            .args(extra_var("brew_prefix", &self.settings.packages.prefix()))
    }

    fn with_switches(&self, mut call: Call) -> Call {
        if self.options.ask_become_pass {
            call = call.arg("--ask-become-pass");
        }

        if self.options.check {
            call = call.arg("--check");
        }

        call
    }

    /// Run the top-level playbook, then the user playbook if discovered and
    /// in scope.
    ///
    /// Engine output reaches the operator verbatim. Failures are not
    /// retried.
    ///
    /// # Errors
    ///
    /// - Return [`PlaybookError::MissingPlaybook`] if the top-level playbook
    ///   does not exist.
    /// - Return [`PlaybookError::Engine`] if Ansible fails. The user
    ///   playbook does not run if the top-level playbook failed.
    #[instrument(skip(self, optional), level = "debug")]
    pub fn run(
        &self,
        optional: &[Discovered],
        scope: PlaybookScope,
        dotfiles_available: bool,
    ) -> Result<()> {
        for discovered in optional.iter().filter(|d| d.step.in_scope(scope)) {
            info!("include {} from {}", discovered.step, discovered.path.display());
        }

        let call = self.invocation(optional, scope, dotfiles_available)?;
        info!("run {}", self.settings.bootstrap.playbook_path().display());
        self.syscall.call(&call)?;

        let user_playbook = optional
            .iter()
            .filter(|d| d.step == OptionalStep::UserPlaybook && d.step.in_scope(scope));
        for discovered in user_playbook {
            info!("run {}", discovered.path.display());
            self.syscall.call(&self.user_invocation(&discovered.path))?;
        }

        Ok(())
    }
}

fn extra_var(name: &str, value: &Path) -> [String; 2] {
    [
        "--extra-vars".into(),
        format!("{name}={:?}", value.to_string_lossy()),
    ]
}

/// All possible error types for playbook execution.
#[derive(Debug, thiserror::Error)]
pub enum PlaybookError {
    /// Top-level playbook is not where it should be.
    #[error("playbook {path:?} does not exist")]
    MissingPlaybook { path: PathBuf },

    /// Configuration-management engine failed.
    #[error(transparent)]
    Engine(#[from] SyscallError),
}

/// Friendly result alias :3
type Result<T, E = PlaybookError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{BootstrapSettings, PackageSettings},
        syscall::fake::Recorder,
    };
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, write};

    struct Fixture {
        _root: tempfile::TempDir,
        settings: Settings,
    }

    impl Fixture {
        fn new() -> anyhow::Result<Self> {
            let root = tempfile::tempdir()?;
            let settings = Settings {
                bootstrap: BootstrapSettings {
                    home: root.path().join(".dotstrap"),
                    ..Default::default()
                },
                dotfiles: DotfilesSettings {
                    url: Some("https://blah.org/dotfiles.git".into()),
                    home: root.path().join(".dotfiles"),
                    ..Default::default()
                },
                packages: PackageSettings {
                    prefix: Some(root.path().join("brew")),
                    ..Default::default()
                },
            };
            create_dir_all(settings.bootstrap.home.join("ansible"))?;
            write(settings.bootstrap.playbook_path(), "---\n")?;
            create_dir_all(&settings.dotfiles.home)?;

            Ok(Self {
                _root: root,
                settings,
            })
        }

        fn add_dotfile(&self, step: OptionalStep) -> anyhow::Result<PathBuf> {
            let path = self
                .settings
                .dotfiles
                .home
                .join(step.relative_path(&self.settings.dotfiles));
            write(&path, "---\n")?;
            Ok(path)
        }
    }

    #[test]
    fn discover_nothing_in_empty_dotfiles() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;

        assert!(OptionalStep::discover(&fixture.settings.dotfiles).is_empty());

        Ok(())
    }

    #[test]
    fn discover_files_added_later() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let manifest = fixture.add_dotfile(OptionalStep::PackageManifest)?;

        assert_eq!(
            OptionalStep::discover(&fixture.settings.dotfiles),
            vec![Discovered {
                step: OptionalStep::PackageManifest,
                path: manifest.clone(),
            }]
        );

        let playbook = fixture.add_dotfile(OptionalStep::UserPlaybook)?;

        assert_eq!(
            OptionalStep::discover(&fixture.settings.dotfiles),
            vec![
                Discovered {
                    step: OptionalStep::UserPlaybook,
                    path: playbook,
                },
                Discovered {
                    step: OptionalStep::PackageManifest,
                    path: manifest,
                },
            ]
        );

        Ok(())
    }

    #[test]
    fn directory_does_not_count_as_optional_file() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        create_dir_all(fixture.settings.dotfiles.home.join("Brewfile"))?;

        assert!(OptionalStep::discover(&fixture.settings.dotfiles).is_empty());

        Ok(())
    }

    #[test]
    fn absent_optional_files_are_not_passed() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let recorder = Recorder::new();
        let runner = PlaybookRunner::new(&fixture.settings, &recorder, PlaybookOptions::default());

        runner.run(&[], PlaybookScope::Full, true)?;
        let line = &recorder.lines()[0];

        assert!(line.contains("ansible-playbook"));
        assert!(line.contains("dotfiles_home="));
        assert!(!line.contains("playbook.yml"));
        assert!(!line.contains("package_manifest"));
        assert!(!line.contains("--tags"));

        Ok(())
    }

    #[test]
    fn present_optional_files_are_passed() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fixture.add_dotfile(OptionalStep::UserPlaybook)?;
        fixture.add_dotfile(OptionalStep::PackageManifest)?;
        let optional = OptionalStep::discover(&fixture.settings.dotfiles);
        let runner = PlaybookRunner::new(&fixture.settings, Recorder::new(), PlaybookOptions::default());

        let call = runner.invocation(&optional, PlaybookScope::Full, true)?;
        let line = call.to_string();

        assert!(line.contains("package_manifest="));
        assert!(!line.contains("playbook.yml"));
        assert_eq!(call.working_dir(), Some(fixture.settings.bootstrap.home.as_path()));

        Ok(())
    }

    #[test]
    fn user_playbook_runs_after_top_level_playbook() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let user_playbook = fixture.add_dotfile(OptionalStep::UserPlaybook)?;
        let optional = OptionalStep::discover(&fixture.settings.dotfiles);
        let recorder = Recorder::new();
        let options = PlaybookOptions {
            ask_become_pass: true,
            check: false,
        };
        let runner = PlaybookRunner::new(&fixture.settings, &recorder, options);

        runner.run(&optional, PlaybookScope::Full, true)?;
        let calls = recorder.calls.borrow();

        assert_eq!(calls.len(), 2);
        assert!(calls[0].has_arg(fixture.settings.bootstrap.playbook_path()));
        assert!(calls[1].has_arg(&user_playbook));
        assert!(calls[1].has_arg("--ask-become-pass"));
        assert_eq!(
            Path::new(calls[1].program()),
            fixture.settings.packages.bin("ansible-playbook").as_path()
        );
        assert_eq!(calls[1].working_dir(), Some(fixture.settings.dotfiles.home.as_path()));

        Ok(())
    }

    #[test]
    fn user_playbook_is_skipped_when_top_level_playbook_fails() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fixture.add_dotfile(OptionalStep::UserPlaybook)?;
        let optional = OptionalStep::discover(&fixture.settings.dotfiles);
        let recorder = Recorder::new().fail_on("ansible/main.yml");
        let runner = PlaybookRunner::new(&fixture.settings, &recorder, PlaybookOptions::default());

        let result = runner.run(&optional, PlaybookScope::Full, true);

        assert!(matches!(result, Err(PlaybookError::Engine(_))));
        assert_eq!(recorder.lines().len(), 1);

        Ok(())
    }

    #[test]
    fn update_scope_never_runs_user_playbook() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fixture.add_dotfile(OptionalStep::UserPlaybook)?;
        let optional = OptionalStep::discover(&fixture.settings.dotfiles);
        let recorder = Recorder::new();
        let runner = PlaybookRunner::new(&fixture.settings, &recorder, PlaybookOptions::default());

        runner.run(&optional, PlaybookScope::Update, true)?;

        assert_eq!(recorder.lines().len(), 1);
        assert!(!recorder.lines()[0].contains("playbook.yml"));

        Ok(())
    }

    #[test]
    fn update_scope_keeps_manifest_only() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fixture.add_dotfile(OptionalStep::UserPlaybook)?;
        fixture.add_dotfile(OptionalStep::PackageManifest)?;
        let optional = OptionalStep::discover(&fixture.settings.dotfiles);
        let runner = PlaybookRunner::new(&fixture.settings, Recorder::new(), PlaybookOptions::default());

        let line = runner
            .invocation(&optional, PlaybookScope::Update, true)?
            .to_string();

        assert!(!line.contains("playbook.yml"));
        assert!(line.contains("package_manifest="));
        assert!(line.ends_with("--tags update"));

        Ok(())
    }

    #[test]
    fn unavailable_dotfiles_hide_dotfiles_home() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let runner = PlaybookRunner::new(&fixture.settings, Recorder::new(), PlaybookOptions::default());

        let line = runner.invocation(&[], PlaybookScope::Full, false)?.to_string();

        assert!(!line.contains("dotfiles_home"));

        Ok(())
    }

    #[test]
    fn forward_engine_switches() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let options = PlaybookOptions {
            ask_become_pass: true,
            check: true,
        };
        let runner = PlaybookRunner::new(&fixture.settings, Recorder::new(), options);

        let call = runner.invocation(&[], PlaybookScope::Full, false)?;

        assert!(call.has_arg("--ask-become-pass"));
        assert!(call.has_arg("--check"));

        Ok(())
    }

    #[test]
    fn missing_playbook_is_fatal() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        std::fs::remove_file(fixture.settings.bootstrap.playbook_path())?;
        let recorder = Recorder::new();
        let runner = PlaybookRunner::new(&fixture.settings, &recorder, PlaybookOptions::default());

        let result = runner.run(&[], PlaybookScope::Full, false);

        assert!(matches!(result, Err(PlaybookError::MissingPlaybook { .. })));
        assert!(recorder.lines().is_empty());

        Ok(())
    }

    #[test]
    fn engine_failure_is_surfaced() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let recorder = Recorder::new().fail_on("ansible-playbook");
        let runner = PlaybookRunner::new(&fixture.settings, &recorder, PlaybookOptions::default());

        let result = runner.run(&[], PlaybookScope::Full, false);

        assert!(matches!(result, Err(PlaybookError::Engine(_))));

        Ok(())
    }
}
