// src/oracle/mod.rs

//! Package database queries
//!
//! The resolver never talks to apt or dpkg directly. It asks two questions
//! through the traits defined here, which keeps the decision logic testable
//! against in-memory fakes:
//!
//! - [`ReverseDependencyOracle`]: who depends on this package?
//! - [`InstallationOracle`]: is this package installed?

pub mod apt;
pub mod dpkg;

pub use apt::AptCache;
pub use dpkg::InstalledPackages;

use crate::error::Result;
use std::collections::HashSet;
use std::process::Command;

/// Answers reverse-dependency queries
///
/// Implementations must return the full set of dependents, direct and
/// indirect, installed or not. The resolver performs no graph walk of its
/// own and relies on this closure being complete.
pub trait ReverseDependencyOracle: Sync {
    /// Packages that depend on `package`, in the order the database lists
    /// them; duplicates are allowed
    fn reverse_dependents(&self, package: &str) -> Result<Vec<String>>;
}

/// Answers whether a package is installed on this system
pub trait InstallationOracle: Sync {
    fn is_installed(&self, package: &str) -> bool;
}

impl<F> InstallationOracle for F
where
    F: Fn(&str) -> bool + Sync,
{
    fn is_installed(&self, package: &str) -> bool {
        self(package)
    }
}

impl InstallationOracle for HashSet<String> {
    fn is_installed(&self, package: &str) -> bool {
        self.contains(package)
    }
}

/// Render a command line for log and error messages
pub(crate) fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}
