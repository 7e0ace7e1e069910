// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Prerequisite installation.
//!
//! Make sure the developer tools, Homebrew, and the dependencies the playbook
//! relies on are installed. Installation is check-then-install: a present
//! prerequisite is left untouched, with no forced upgrade, so running the
//! installer against an already converged machine runs nothing at all.
//!
//! Any failure here is fatal to the bootstrap sequence, because every later
//! step assumes these tools exist.

use crate::{
    config::PackageSettings,
    probe::{Prerequisite, Prober},
    syscall::{Call, Syscall, SyscallError},
};

use tracing::{info, instrument, warn};

/// Official Homebrew installation script.
pub const HOMEBREW_INSTALL_URL: &str =
    "https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh";

/// Effect that ensuring a prerequisite had on the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Prerequisite was missing and got installed.
    Installed,

    /// Prerequisite was already present. Nothing ran.
    Unchanged,
}

/// Check-then-install driver for bootstrap prerequisites.
pub struct Installer<'a, S>
where
    S: Syscall,
{
    packages: &'a PackageSettings,
    prober: Prober<'a>,
    syscall: S,
}

impl<'a, S> Installer<'a, S>
where
    S: Syscall,
{
    /// Construct new installer.
    pub fn new(packages: &'a PackageSettings, syscall: S) -> Self {
        Self {
            packages,
            prober: Prober::new(packages),
            syscall,
        }
    }

    /// Ensure every prerequisite in installation order.
    ///
    /// Each prerequisite is re-checked on its own, regardless of what was
    /// found before it.
    ///
    /// # Errors
    ///
    /// - Return the first [`InstallError`] encountered. Nothing after it is
    ///   attempted.
    pub fn ensure_all(&self) -> Result<Vec<(Prerequisite, Change)>> {
        self.prober
            .prerequisites()
            .into_iter()
            .map(|prereq| self.ensure(&prereq).map(|change| (prereq, change)))
            .collect()
    }

    /// Ensure a single prerequisite is installed.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Syscall`] if the installing command fails.
    /// - Return [`InstallError::Pending`] if the developer tools installer
    ///   was launched but has not finished yet.
    /// - Return [`InstallError::Unsupported`] if the prerequisite cannot be
    ///   installed automatically on this platform.
    /// - Return [`InstallError::StillMissing`] if the installing command
    ///   succeeded, but the prerequisite still cannot be found.
    #[instrument(skip(self), level = "debug")]
    pub fn ensure(&self, prereq: &Prerequisite) -> Result<Change> {
        if self.prober.is_present(prereq) {
            info!("{prereq} already installed");
            return Ok(Change::Unchanged);
        }

        info!("install {prereq}");
        let call = self.install_call(prereq)?;
        self.syscall
            .call(&call)
            .map_err(|err| InstallError::Syscall {
                prereq: prereq.clone(),
                source: err,
            })?;

        // INVARIANT: Trust the filesystem, not the exit status of the installer.
        if !self.prober.is_present(prereq) {
            if *prereq == Prerequisite::DeveloperTools {
                warn!("developer tools installer still running");
                return Err(InstallError::Pending);
            }

            return Err(InstallError::StillMissing {
                prereq: prereq.clone(),
            });
        }

        Ok(Change::Installed)
    }

    fn install_call(&self, prereq: &Prerequisite) -> Result<Call> {
        let brew = self.packages.bin("brew");
        match prereq {
            Prerequisite::DeveloperTools if cfg!(target_os = "macos") => {
                Ok(Call::new("xcode-select").arg("--install"))
            }
            Prerequisite::DeveloperTools => Err(InstallError::Unsupported {
                prereq: prereq.clone(),
            }),
            Prerequisite::PackageManager => Ok(Call::new("/bin/bash").args([
                "-c".to_string(),
                format!("/bin/bash -c \"$(curl -fsSL {HOMEBREW_INSTALL_URL})\""),
            ])),
            Prerequisite::Tap(name) => {
                if self.prober.tap_path(name).is_none() {
                    return Err(InstallError::MalformedTap(name.clone()));
                }

                Ok(Call::new(brew).arg("tap").arg(name))
            }
            Prerequisite::Formula(name) => Ok(Call::new(brew).arg("install").arg(name)),
        }
    }
}

/// All possible error types for prerequisite installation.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Installing command failed.
    #[error("failed to install {prereq}")]
    Syscall {
        prereq: Prerequisite,
        source: SyscallError,
    },

    /// Installing command succeeded, but prerequisite is still absent.
    #[error("{prereq} is still missing after installation")]
    StillMissing { prereq: Prerequisite },

    /// Developer tools installer runs asynchronously and has not finished.
    #[error("developer tools installation has not finished, complete it and run again")]
    Pending,

    /// Prerequisite cannot be installed automatically here.
    #[error("cannot install {prereq} automatically on this platform")]
    Unsupported { prereq: Prerequisite },

    /// Tap name is not of the form `user/repo`.
    #[error("malformed tap name {0:?}, expected user/repo")]
    MalformedTap(String),
}

/// Friendly result alias :3
type Result<T, E = InstallError> = std::result::Result<T, E>;
