// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that dotstrap reads to
//! determine where things live and what gets installed. Every field carries
//! a default, so a missing configuration file is the same as an empty one.
//!
//! # General Layout
//!
//! ```toml
//! [bootstrap]
//! url = "https://github.com/dotstrap/dotstrap.git"
//! home = "~/.dotstrap"
//! playbook = "ansible/main.yml"
//!
//! [dotfiles]
//! url = "git@github.com:me/dotfiles.git"
//! home = "~/.dotfiles"
//! playbook = "playbook.yml"
//! manifest = "Brewfile"
//!
//! [packages]
//! developer_tools = "/Library/Developer/CommandLineTools"
//! formulae = ["ansible"]
//! taps = []
//! ```
//!
//! The `DOTFILES_URL` environment variable takes precedence over
//! `dotfiles.url`. Without either, every dotfiles step is disabled.

use crate::path::{default_brew_prefix, default_developer_tools};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Environment variable supplying the dotfiles repository location.
pub const DOTFILES_URL_VAR: &str = "DOTFILES_URL";

/// Complete settings of a bootstrap run.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Where the bootstrap repository comes from and lives.
    pub bootstrap: BootstrapSettings,

    /// Optional dotfiles repository of the user.
    pub dotfiles: DotfilesSettings,

    /// Package manager and its dependencies.
    pub packages: PackageSettings,
}

impl Settings {
    /// Default settings with all paths expanded.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if a default path cannot be
    ///   expanded, e.g., `$HOME` is not set.
    pub fn try_default() -> Result<Self> {
        let mut settings = Self::default();
        settings.expand_paths()?;
        Ok(settings)
    }

    /// Load settings from configuration file, then apply environment
    /// overrides.
    ///
    /// A missing file at `path` is treated as an empty configuration when
    /// `required` is false.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read, or
    ///   is missing while `required` is set.
    /// - Return [`ConfigError::Deserialize`] if file content is invalid.
    /// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>, required: bool) -> Result<Self> {
        let path = path.as_ref();
        let mut settings = if path.exists() || required {
            debug!("read configuration from {}", path.display());
            read_to_string(path)
                .map_err(|err| ConfigError::Read {
                    source: err,
                    path: path.to_path_buf(),
                })?
                .parse()?
        } else {
            debug!("no configuration at {}, use defaults", path.display());
            Self::try_default()?
        };

        settings.apply_env();
        Ok(settings)
    }

    /// Apply `DOTFILES_URL` on top of configured dotfiles URL.
    ///
    /// An empty value counts as unset.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(DOTFILES_URL_VAR) {
            if !url.trim().is_empty() {
                self.dotfiles.url = Some(url);
            }
        }
    }

    fn expand_paths(&mut self) -> Result<()> {
        self.bootstrap.home = expand(&self.bootstrap.home)?;
        self.dotfiles.home = expand(&self.dotfiles.home)?;
        self.packages.developer_tools = expand(&self.packages.developer_tools)?;
        if let Some(prefix) = &self.packages.prefix {
            self.packages.prefix = Some(expand(prefix)?);
        }

        Ok(())
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every absolute path field.
        settings.expand_paths()?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Bootstrap repository settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapSettings {
    /// Remote URL of the bootstrap repository.
    pub url: String,

    /// Branch to check out instead of the remote default.
    pub branch: Option<String>,

    /// Local clone of the bootstrap repository.
    pub home: PathBuf,

    /// Top-level playbook, relative to bootstrap home.
    pub playbook: PathBuf,
}

impl BootstrapSettings {
    /// Absolute path to top-level playbook.
    pub fn playbook_path(&self) -> PathBuf {
        self.home.join(&self.playbook)
    }
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            url: "https://github.com/dotstrap/dotstrap.git".into(),
            branch: None,
            home: PathBuf::from("~/.dotstrap"),
            playbook: PathBuf::from("ansible").join("main.yml"),
        }
    }
}

/// Dotfiles repository settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DotfilesSettings {
    /// Remote URL of the dotfiles repository. Absence disables all
    /// dotfiles steps.
    pub url: Option<String>,

    /// Branch to check out instead of the remote default.
    pub branch: Option<String>,

    /// Local clone of the dotfiles repository.
    pub home: PathBuf,

    /// Optional user playbook, relative to dotfiles home.
    pub playbook: PathBuf,

    /// Optional package manifest, relative to dotfiles home.
    pub manifest: PathBuf,
}

impl DotfilesSettings {
    /// Check if a dotfiles repository was configured at all.
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

impl Default for DotfilesSettings {
    fn default() -> Self {
        Self {
            url: None,
            branch: None,
            home: PathBuf::from("~/.dotfiles"),
            playbook: PathBuf::from("playbook.yml"),
            manifest: PathBuf::from("Brewfile"),
        }
    }
}

/// Package manager settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PackageSettings {
    /// Homebrew installation prefix. Platform default when absent.
    pub prefix: Option<PathBuf>,

    /// Location of command-line developer tools. Platform default when
    /// absent from configuration.
    pub developer_tools: PathBuf,

    /// Formulae that must be installed before the playbook can run.
    pub formulae: Vec<String>,

    /// Taps that must be installed before the playbook can run.
    pub taps: Vec<String>,
}

impl PackageSettings {
    /// Effective Homebrew prefix.
    pub fn prefix(&self) -> PathBuf {
        self.prefix.clone().unwrap_or_else(default_brew_prefix)
    }

    /// Path to a binary installed under the Homebrew prefix.
    pub fn bin(&self, name: impl AsRef<Path>) -> PathBuf {
        self.prefix().join("bin").join(name)
    }
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            prefix: None,
            developer_tools: default_developer_tools(),
            formulae: vec!["ansible".into()],
            taps: Vec::new(),
        }
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file {path:?}")]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
