// src/oracle/dpkg.rs

//! Installed-package snapshot from `dpkg-query`

use super::{InstallationOracle, describe};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::process::Command;
use tracing::{debug, info};

/// Output format: package name (with `:arch` for foreign multi-arch
/// packages) followed by the abbreviated status, e.g. `ii `
const QUERY_FORMAT: &str = "${binary:Package} ${db:Status-Abbrev}\n";

/// Installed packages, queried once from the dpkg database
#[derive(Debug, Clone, Default)]
pub struct InstalledPackages {
    names: HashSet<String>,
}

impl InstalledPackages {
    /// Snapshot the installed set using `dpkg-query`
    pub fn query() -> Result<Self> {
        let mut cmd = Command::new("dpkg-query");
        cmd.arg("-W").arg("-f").arg(QUERY_FORMAT);
        let command = describe(&cmd);
        debug!("Running {}", command);

        let output = cmd.output().map_err(|e| Error::CommandFailed {
            command: command.clone(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let installed = Self::from_dpkg_output(&String::from_utf8_lossy(&output.stdout));
        info!("{} packages are installed", installed.len());
        Ok(installed)
    }

    /// Build the set from `dpkg-query -W` output
    ///
    /// A package counts as installed when its desired state is install or
    /// hold and its current state is installed (`ii` or `hi`). Multi-arch
    /// qualified names are recorded both with and without the `:arch`
    /// suffix.
    pub fn from_dpkg_output(output: &str) -> Self {
        let mut names = HashSet::new();

        for line in output.lines() {
            let mut fields = line.split_whitespace();
            let (Some(name), Some(status)) = (fields.next(), fields.next()) else {
                continue;
            };
            if !(status.starts_with("ii") || status.starts_with("hi")) {
                continue;
            }
            if let Some((bare, _arch)) = name.split_once(':') {
                names.insert(bare.to_string());
            }
            names.insert(name.to_string());
        }

        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl InstallationOracle for InstalledPackages {
    fn is_installed(&self, package: &str) -> bool {
        self.names.contains(package)
    }
}
