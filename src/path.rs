// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine well-known locations that the bootstrap sequence needs before
//! any configuration has been read, e.g., the user's home directory, the
//! default configuration file, and the default Homebrew prefix.

use std::path::PathBuf;

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/dotstrap/config.toml` as
/// the default. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("dotstrap").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Default installation prefix of Homebrew for the current platform.
///
/// Apple silicon installs into `/opt/homebrew`, Intel macs into
/// `/usr/local`, and everything else into the Linuxbrew prefix.
pub fn default_brew_prefix() -> PathBuf {
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        PathBuf::from("/opt/homebrew")
    } else if cfg!(target_os = "macos") {
        PathBuf::from("/usr/local")
    } else {
        PathBuf::from("/home/linuxbrew/.linuxbrew")
    }
}

/// Default location of command-line developer tools for the current
/// platform.
///
/// On macOS this is the Command Line Tools bundle. Elsewhere the system C
/// compiler stands in for the developer tools.
pub fn default_developer_tools() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/Library/Developer/CommandLineTools")
    } else {
        PathBuf::from("/usr/bin/cc")
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_path_is_namespaced() -> anyhow::Result<()> {
        let path = default_config_path()?;
        assert!(path.ends_with("dotstrap/config.toml"));
        Ok(())
    }

    #[test]
    fn default_brew_prefix_is_absolute() {
        assert!(default_brew_prefix().is_absolute());
    }
}
