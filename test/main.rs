// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

#[path = "../src/syscall/fake.rs"]
mod fake;

pub(crate) use fake::Recorder;

use anyhow::Result;
use dotstrap::{
    config::{BootstrapSettings, DotfilesSettings, PackageSettings},
    syscall::{Call, Syscall, SyscallError},
    Settings,
};
use git2::{Repository, RepositoryInitOptions, Signature};
use std::{
    fs::{create_dir_all, remove_file, write},
    path::{Path, PathBuf},
};
use tempfile::TempDir;

pub(crate) struct RepoFixture {
    repo: Repository,
}

impl RepoFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        Ok(Self { repo })
    }

    pub(crate) fn url(&self) -> String {
        self.workdir().to_string_lossy().into_owned()
    }

    fn workdir(&self) -> &Path {
        self.repo.workdir().expect("fixture is not bare")
    }

    pub(crate) fn stage_and_commit(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<()> {
        let path = self.workdir().join(filename.as_ref());
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write(&path, contents.as_ref())?;

        let mut index = self.repo.index()?;
        index.add_path(filename.as_ref())?;
        index.write()?;
        self.commit(&mut index, format!("chore: add {:?}", filename.as_ref()))
    }

    pub(crate) fn remove_and_commit(&self, filename: impl AsRef<Path>) -> Result<()> {
        remove_file(self.workdir().join(filename.as_ref()))?;

        let mut index = self.repo.index()?;
        index.remove_path(filename.as_ref())?;
        index.write()?;
        self.commit(&mut index, format!("chore: remove {:?}", filename.as_ref()))
    }

    fn commit(&self, index: &mut git2::Index, message: String) -> Result<()> {
        // INVARIANT: Always use new tree produced by index after staging.
        let tree = self.repo.find_tree(index.write_tree()?)?;

        // INVARIANT: Always determine latest parent commit to append to.
        let signature = Signature::now("John Doe", "john@doe.com")?;
        let mut parents = Vec::new();
        if let Ok(head) = self.repo.head() {
            parents.push(head.peel_to_commit()?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &message,
            &tree,
            &parents,
        )?;

        Ok(())
    }
}

/// Scratch machine with its own home directory, Homebrew prefix, and
/// upstream repositories.
pub(crate) struct Machine {
    root: TempDir,
    pub(crate) bootstrap_upstream: RepoFixture,
    pub(crate) dotfiles_upstream: RepoFixture,
}

impl Machine {
    /// Fresh machine where nothing is installed yet.
    pub(crate) fn fresh() -> Result<Self> {
        let root = tempfile::tempdir()?;
        let bootstrap_upstream = RepoFixture::new(root.path().join("upstream/bootstrap"))?;
        bootstrap_upstream.stage_and_commit("ansible/main.yml", "- hosts: localhost\n")?;
        let dotfiles_upstream = RepoFixture::new(root.path().join("upstream/dotfiles"))?;
        dotfiles_upstream.stage_and_commit("README.md", "my dotfiles\n")?;
        create_dir_all(root.path().join("brew"))?;

        Ok(Self {
            root,
            bootstrap_upstream,
            dotfiles_upstream,
        })
    }

    /// Machine where every prerequisite is already installed.
    pub(crate) fn provisioned() -> Result<Self> {
        let machine = Self::fresh()?;
        machine.install_developer_tools()?;
        machine.install_brew()?;
        machine.install_tap("homebrew", "bundle")?;
        machine.install_formula("ansible")?;

        Ok(machine)
    }

    pub(crate) fn prefix(&self) -> PathBuf {
        self.root.path().join("brew")
    }

    pub(crate) fn bootstrap_home(&self) -> PathBuf {
        self.root.path().join("home/.dotstrap")
    }

    pub(crate) fn dotfiles_home(&self) -> PathBuf {
        self.root.path().join("home/.dotfiles")
    }

    pub(crate) fn install_developer_tools(&self) -> Result<()> {
        create_dir_all(self.prefix().join("CommandLineTools"))?;
        Ok(())
    }

    pub(crate) fn install_brew(&self) -> Result<()> {
        create_dir_all(self.prefix().join("bin"))?;
        write(self.prefix().join("bin/brew"), "#!/bin/sh\n")?;
        Ok(())
    }

    pub(crate) fn install_tap(&self, user: &str, repo: &str) -> Result<()> {
        create_dir_all(
            self.prefix()
                .join("Library/Taps")
                .join(user)
                .join(format!("homebrew-{repo}")),
        )?;
        Ok(())
    }

    pub(crate) fn install_formula(&self, name: &str) -> Result<()> {
        create_dir_all(self.prefix().join("Cellar").join(name).join("1.0.0"))?;
        Ok(())
    }

    /// Settings pointing everything at this machine, dotfiles disabled.
    pub(crate) fn settings(&self) -> Settings {
        Settings {
            bootstrap: BootstrapSettings {
                url: self.bootstrap_upstream.url(),
                home: self.bootstrap_home(),
                ..Default::default()
            },
            dotfiles: DotfilesSettings {
                url: None,
                home: self.dotfiles_home(),
                ..Default::default()
            },
            packages: PackageSettings {
                prefix: Some(self.prefix()),
                developer_tools: self.prefix().join("CommandLineTools"),
                formulae: vec!["ansible".into()],
                taps: vec!["homebrew/bundle".into()],
            },
        }
    }

    /// Settings with dotfiles enabled.
    pub(crate) fn settings_with_dotfiles(&self) -> Settings {
        let mut settings = self.settings();
        settings.dotfiles.url = Some(self.dotfiles_upstream.url());
        settings
    }

    /// Another upstream repository next to the default ones.
    pub(crate) fn upstream(&self, name: &str) -> Result<RepoFixture> {
        RepoFixture::new(self.root.path().join("upstream").join(name))
    }

    pub(crate) fn unreachable_url(&self) -> String {
        self.root
            .path()
            .join("upstream/nowhere")
            .to_string_lossy()
            .into_owned()
    }
}
