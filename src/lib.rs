// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Personal machine bootstrapper.
//!
//! Dotstrap converges a workstation to a desired state. It installs Homebrew
//! and Ansible, clones a __bootstrap repository__ holding the top-level
//! playbook, optionally clones the user's __dotfiles repository__, and hands
//! the rest to Ansible.
//!
//! # Idempotency
//!
//! Running dotstrap twice against unchanged external state must not mutate
//! anything the second time. Dotstrap keeps no progress state of its own.
//! Every mutating step is preceded by a filesystem check of its
//! precondition (installed? cloned? file present?), and everything past
//! that is delegated to tools that are idempotent themselves.
//!
//! # See Also
//!
//! 1. [`bootstrap`] for the sequence itself.
//! 2. [`config`] for the configuration file layout.

pub mod bootstrap;
pub mod config;
pub mod fetch;
pub mod install;
pub mod path;
pub mod playbook;
pub mod probe;
pub mod syscall;

pub use bootstrap::{
    report::{BootstrapReport, CheckReport, Outcome, Step},
    Bootstrap, BootstrapError, Options,
};
pub use config::Settings;
pub use syscall::{Call, Syscall, SystemSyscall};
