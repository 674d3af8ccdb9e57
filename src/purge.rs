// src/purge.rs

//! Purging the obsolete set with apt-get

use crate::error::{Error, Result};
use crate::oracle::describe;
use std::process::Command;
use tracing::info;

/// Executes the removal of a computed obsolete set
pub trait PurgeExecutor {
    fn purge(&self, packages: &[String]) -> Result<()>;
}

/// How `apt-get purge` is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeMode {
    /// Remove packages and their configuration
    Purge,
    /// Let apt report what it would do without touching the system
    Simulate,
}

/// [`PurgeExecutor`] that runs `apt-get purge`
///
/// `--ignore-missing` is always passed: package names recorded in old
/// history may no longer exist in the archive.
#[derive(Debug, Clone)]
pub struct AptGetPurge {
    program: String,
    mode: PurgeMode,
}

impl AptGetPurge {
    pub fn new(mode: PurgeMode) -> Self {
        Self {
            program: "apt-get".to_string(),
            mode,
        }
    }

    /// Use a different `apt-get` binary (tests, chroots)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Build the apt-get invocation for `packages`
    pub fn command(&self, packages: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.mode {
            PurgeMode::Purge => cmd.arg("--assume-yes"),
            PurgeMode::Simulate => cmd.arg("--simulate"),
        };
        cmd.arg("--ignore-missing").arg("purge").args(packages);
        cmd
    }
}

impl PurgeExecutor for AptGetPurge {
    fn purge(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            info!("Nothing to purge");
            return Ok(());
        }

        let mut cmd = self.command(packages);
        match self.mode {
            PurgeMode::Purge => info!("Purging {} packages...", packages.len()),
            PurgeMode::Simulate => info!("Simulating purge of {} packages...", packages.len()),
        }

        // apt-get inherits stdio so its progress reaches the terminal
        let status = cmd
            .status()
            .map_err(|e| Error::Purge(format!("could not run {}: {}", self.program, e)))?;

        if !status.success() {
            return Err(Error::Purge(format!("{} exited with {}", describe(&cmd), status)));
        }

        Ok(())
    }
}
