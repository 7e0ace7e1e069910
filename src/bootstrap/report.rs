// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bootstrap run reporting.
//!
//! Keep an ordered ledger of what every step of a run did to the machine.
//! The ledger makes idempotency observable: a run against an already
//! converged machine records no [`Outcome::Changed`] entry at all.

use crate::{
    fetch::FetchOutcome,
    install::Change,
    playbook::{Discovered, OptionalStep, PlaybookScope},
    probe::{Prerequisite, Probe},
};

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Single step of a bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Ensure a prerequisite is installed.
    Prerequisite(Prerequisite),

    /// Clone or update a repository, by name.
    Fetch(String),

    /// Enable an optional step of the playbook.
    Optional(OptionalStep),

    /// Run the top-level playbook.
    Playbook(PlaybookScope),
}

impl Display for Step {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Prerequisite(prereq) => format!("install {prereq}"),
            Self::Fetch(name) => format!("fetch {name}"),
            Self::Optional(step) => format!("include {step}"),
            Self::Playbook(PlaybookScope::Full) => "run playbook".to_string(),
            Self::Playbook(PlaybookScope::Update) => "run playbook updates".to_string(),
        };

        fmt.pad(&label)
    }
}

/// What a step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Step mutated the machine.
    Changed,

    /// Step found its precondition already satisfied.
    Unchanged,

    /// Step was not attempted.
    Skipped,

    /// Step was handed to an idempotent external tool.
    Delegated,

    /// Step failed without aborting the run.
    Failed(String),
}

impl Display for Outcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Changed => fmt.write_str("changed"),
            Self::Unchanged => fmt.write_str("unchanged"),
            Self::Skipped => fmt.write_str("skipped"),
            Self::Delegated => fmt.write_str("delegated"),
            Self::Failed(reason) => write!(fmt, "failed: {reason}"),
        }
    }
}

impl From<Change> for Outcome {
    fn from(change: Change) -> Self {
        match change {
            Change::Installed => Self::Changed,
            Change::Unchanged => Self::Unchanged,
        }
    }
}

impl From<FetchOutcome> for Outcome {
    fn from(outcome: FetchOutcome) -> Self {
        match outcome {
            FetchOutcome::Cloned | FetchOutcome::Updated => Self::Changed,
            FetchOutcome::UpToDate => Self::Unchanged,
        }
    }
}

/// Ordered ledger of a bootstrap run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    entries: Vec<(Step, Outcome)>,
}

impl BootstrapReport {
    /// Record outcome of the next step.
    pub fn record(&mut self, step: Step, outcome: impl Into<Outcome>) {
        self.entries.push((step, outcome.into()));
    }

    pub fn entries(&self) -> &[(Step, Outcome)] {
        &self.entries
    }

    /// Outcome of target step, if it was recorded.
    pub fn outcome_of(&self, step: &Step) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|(recorded, _)| recorded == step)
            .map(|(_, outcome)| outcome)
    }

    /// Steps that mutated the machine.
    pub fn changed(&self) -> Vec<&Step> {
        self.filter(|outcome| *outcome == Outcome::Changed)
    }

    /// Steps that failed without aborting the run.
    pub fn failed(&self) -> Vec<&Step> {
        self.filter(|outcome| matches!(outcome, Outcome::Failed(_)))
    }

    /// Check if run found the machine already converged.
    pub fn is_converged(&self) -> bool {
        self.changed().is_empty() && self.failed().is_empty()
    }

    fn filter(&self, pred: impl Fn(&Outcome) -> bool) -> Vec<&Step> {
        self.entries
            .iter()
            .filter(|(_, outcome)| pred(outcome))
            .map(|(step, _)| step)
            .collect()
    }
}

impl Display for BootstrapReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (step, outcome) in &self.entries {
            writeln!(fmt, "{step:<36} {outcome}")?;
        }

        write!(
            fmt,
            "{} changed, {} failed",
            self.changed().len(),
            self.failed().len()
        )
    }
}

/// Non-mutating status of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// Presence of every prerequisite.
    pub probe: Probe,

    /// Bootstrap home holds the top-level playbook.
    pub bootstrapped: bool,

    /// Dotfiles home exists. [`None`] if dotfiles are disabled.
    pub dotfiles: Option<bool>,

    /// Optional steps the next run would include.
    pub optional: Vec<Discovered>,
}

impl Display for CheckReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.probe)?;
        let bootstrapped = if self.bootstrapped { "present" } else { "missing" };
        writeln!(fmt, "{:<32} {bootstrapped}", "bootstrap home")?;
        let dotfiles = match self.dotfiles {
            Some(true) => "present",
            Some(false) => "missing",
            None => "disabled",
        };
        writeln!(fmt, "{:<32} {dotfiles}", "dotfiles home")?;
        for step in OptionalStep::ALL {
            let found = self.optional.iter().any(|discovered| discovered.step == step);
            let mark = if found { "present" } else { "absent" };
            writeln!(fmt, "{step:<32} {mark}")?;
        }

        Ok(())
    }
}
