// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Refresh installed packages of an already bootstrapped machine.
//!
//! Takes no arguments. Same as `dotstrap update` with default settings.

use dotstrap::{path::default_config_path, Bootstrap, Options, Settings, SystemSyscall};

use anyhow::Result;
use std::process::exit;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    let settings = Settings::load(default_config_path()?, false)?;
    Bootstrap::new(settings, SystemSyscall, Options::default()).update()?;
    Ok(())
}
