// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Nearly every mutating step of a bootstrap run is delegated to an external
//! tool: Homebrew installs packages, Ansible applies playbooks, Xcode ships
//! the developer tools. This module describes such an invocation as a
//! [`Call`], and runs it through the [`Syscall`] trait so that callers never
//! touch [`std::process::Command`] directly.
//!
//! Calls always inherit the operator's terminal. External tools may ask for
//! elevated privileges or license acceptance, and their output must reach
//! the operator verbatim.

use std::{
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};
use tracing::{debug, instrument};

/// Description of one external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl Call {
    /// Construct new call to target program.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append many arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run call from within target directory.
    pub fn current_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(path.into());
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Check if call contains target argument.
    pub fn has_arg(&self, arg: impl AsRef<OsStr>) -> bool {
        self.args.iter().any(|a| a.as_os_str() == arg.as_ref())
    }
}

impl Display for Call {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.program.to_string_lossy().as_ref())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(char::is_whitespace) {
                write!(fmt, " {arg:?}")?;
            } else {
                write!(fmt, " {arg}")?;
            }
        }

        Ok(())
    }
}

/// Layer of indirection for running external commands.
pub trait Syscall {
    /// Run call attached to the current terminal, blocking until it exits.
    ///
    /// # Errors
    ///
    /// - Return [`SyscallError::Spawn`] if the program cannot be started.
    /// - Return [`SyscallError::Failed`] if the program exits unsuccessfully.
    fn call(&self, call: &Call) -> Result<()>;
}

impl<S> Syscall for &S
where
    S: Syscall + ?Sized,
{
    fn call(&self, call: &Call) -> Result<()> {
        (**self).call(call)
    }
}

/// Run external commands through the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSyscall;

impl Syscall for SystemSyscall {
    #[instrument(skip(self, call), fields(call = %call), level = "debug")]
    fn call(&self, call: &Call) -> Result<()> {
        debug!("spawn {call}");
        let mut command = Command::new(&call.program);
        command.args(&call.args);
        if let Some(dir) = &call.current_dir {
            command.current_dir(dir);
        }

        let status = command
            .spawn()
            .map_err(|err| SyscallError::Spawn {
                source: err,
                call: call.to_string(),
            })?
            .wait()
            .map_err(|err| SyscallError::Spawn {
                source: err,
                call: call.to_string(),
            })?;

        if !status.success() {
            return Err(SyscallError::Failed {
                call: call.to_string(),
                status,
            });
        }

        Ok(())
    }
}

/// All possible error types for running external commands.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Program could not be started or waited on.
    #[error("failed to run {call:?}")]
    Spawn {
        source: std::io::Error,
        call: String,
    },

    /// Program exited unsuccessfully.
    #[error("command {call:?} failed with {status}")]
    Failed { call: String, status: ExitStatus },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;

#[cfg(test)]
#[allow(dead_code)]
pub(crate) mod fake;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_quotes_arguments_with_whitespace() {
        let call = Call::new("/bin/bash").args(["-c", "echo hello"]);

        assert_eq!(call.to_string(), r#"/bin/bash -c "echo hello""#);
    }

    #[test]
    fn builder_keeps_argument_order() {
        let call = Call::new("brew").arg("install").args(["ansible", "mas"]);

        assert_eq!(
            call.arguments(),
            &[OsString::from("install"), "ansible".into(), "mas".into()]
        );
        assert!(call.has_arg("mas"));
        assert!(!call.has_arg("tap"));
    }

    #[cfg(unix)]
    #[test]
    fn system_syscall_reports_exit_status() {
        let result = SystemSyscall.call(&Call::new("sh").args(["-c", "exit 3"]));

        assert!(matches!(result, Err(SyscallError::Failed { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn system_syscall_runs_in_working_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let call = Call::new("sh")
            .args(["-c", "touch marker"])
            .current_dir(dir.path());
        SystemSyscall.call(&call)?;

        assert!(dir.path().join("marker").exists());

        Ok(())
    }

    #[test]
    fn system_syscall_reports_missing_program() {
        let result = SystemSyscall.call(&Call::new("dotstrap-no-such-program"));

        assert!(matches!(result, Err(SyscallError::Spawn { .. })));
    }
}
