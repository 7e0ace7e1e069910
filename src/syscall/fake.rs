// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Test double that records calls instead of running them.
//!
//! Shared by the unit tests and the integration tests, so it only names
//! what its parent module brings into scope.

use super::{Call, Syscall, SyscallError};

use std::cell::RefCell;

/// Record every call, and optionally fail or act on some of them.
#[derive(Default)]
pub(crate) struct Recorder {
    pub(crate) calls: RefCell<Vec<Call>>,
    fail_on: Vec<String>,
    hooks: Vec<(String, Box<dyn Fn()>)>,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail any call whose rendered line contains `needle`.
    pub(crate) fn fail_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on.push(needle.into());
        self
    }

    /// Run `hook` on any call whose rendered line contains `needle`.
    pub(crate) fn on(mut self, needle: impl Into<String>, hook: impl Fn() + 'static) -> Self {
        self.hooks.push((needle.into(), Box::new(hook)));
        self
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }

    /// Only the playbook invocations.
    pub(crate) fn playbook_lines(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.contains("ansible-playbook"))
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl Syscall for Recorder {
    fn call(&self, call: &Call) -> Result<(), SyscallError> {
        self.calls.borrow_mut().push(call.clone());
        let line = call.to_string();
        for (needle, hook) in &self.hooks {
            if line.contains(needle.as_str()) {
                hook();
            }
        }

        if self.fail_on.iter().any(|needle| line.contains(needle.as_str())) {
            return Err(SyscallError::Spawn {
                source: std::io::Error::other("injected failure"),
                call: line,
            });
        }

        Ok(())
    }
}
