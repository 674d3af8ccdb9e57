// src/oracle/apt.rs

//! Reverse dependencies via `apt-cache rdepends --recurse`
//!
//! `apt-cache rdepends` lists packages that depend on the query, whether or
//! not they are installed. With `--recurse` it prints one section per
//! package reached, so the output covers indirect dependents too:
//!
//! ```text
//! libabiword-2.9
//! Reverse Depends:
//!   abiword
//! abiword
//! Reverse Depends:
//!   xubuntu-desktop
//! xubuntu-desktop
//! Reverse Depends:
//! ```
//!
//! It exits with status 100 when the package is unknown, which happens when a
//! package was renamed or dropped from the archive since it was installed.

use super::{ReverseDependencyOracle, describe};
use crate::error::{Error, Result};
use std::process::Command;
use tracing::debug;

const REVERSE_DEPENDS_HEADER: &str = "Reverse Depends:";

/// Follow dependents transitively, counting only hard dependency relations
const RDEPENDS_OPTIONS: [&str; 6] = [
    "--recurse",
    "--no-suggests",
    "--no-enhances",
    "--no-conflicts",
    "--no-breaks",
    "--no-replaces",
];

/// [`ReverseDependencyOracle`] backed by `apt-cache`
#[derive(Debug, Clone)]
pub struct AptCache {
    program: String,
}

impl AptCache {
    pub fn new() -> Self {
        Self::with_program("apt-cache")
    }

    /// Use a different `apt-cache` binary (tests, chroots)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Build the `apt-cache` invocation for `package`
    pub fn command(&self, package: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(RDEPENDS_OPTIONS).arg("rdepends").arg(package);
        cmd
    }
}

impl Default for AptCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverseDependencyOracle for AptCache {
    fn reverse_dependents(&self, package: &str) -> Result<Vec<String>> {
        let mut cmd = self.command(package);
        debug!("Running {}", describe(&cmd));

        let output = cmd.output().map_err(|e| Error::OracleLookup {
            package: package.to_string(),
            reason: format!("could not run {}: {}", self.program, e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::OracleLookup {
                package: package.to_string(),
                reason: format!("{} ({})", stderr.trim(), output.status),
            });
        }

        Ok(parse_rdepends(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Extract dependent package names from `apt-cache rdepends` output
///
/// The queried name on the first line and every `Reverse Depends:` header
/// are dropped. In recursive output the later section names are dependents
/// themselves and are kept. Alternative dependencies are printed with a
/// leading `|`, which is stripped. Order and duplicates are kept as printed.
pub fn parse_rdepends(output: &str) -> Vec<String> {
    let mut lines = output.lines();

    // First line echoes the queried package
    lines.next();

    lines
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != REVERSE_DEPENDS_HEADER)
        .map(|line| line.trim_start_matches('|').trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rdepends() {
        let output = "abiword-plugin-mathview\nReverse Depends:\n  xubuntu-desktop\n  abiword\n";
        assert_eq!(parse_rdepends(output), vec!["xubuntu-desktop", "abiword"]);
    }

    #[test]
    fn test_parse_rdepends_keeps_duplicates_and_alternatives() {
        let output = "xubuntu-artwork\n\
                      Reverse Depends:\n  \
                      xubuntu-desktop\n  \
                      shimmer-themes\n  \
                      shimmer-themes\n \
                      |gnome-brave-icon-theme\n";
        assert_eq!(
            parse_rdepends(output),
            vec!["xubuntu-desktop", "shimmer-themes", "shimmer-themes", "gnome-brave-icon-theme"]
        );
    }

    #[test]
    fn test_parse_recursive_rdepends() {
        let output = "libbase\n\
                      Reverse Depends:\n  \
                      libmid\n\
                      libmid\n\
                      Reverse Depends:\n  \
                      keeper-app\n\
                      keeper-app\n\
                      Reverse Depends:\n";
        assert_eq!(
            parse_rdepends(output),
            vec!["libmid", "libmid", "keeper-app", "keeper-app"]
        );
    }

    #[test]
    fn test_rdepends_command_recurses() {
        let cmd = AptCache::new().command("libbase");
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "apt-cache");
        assert_eq!(args[0], "--recurse");
        assert!(args.iter().any(|a| a == "--no-suggests"));
        assert!(args.iter().any(|a| a == "--no-enhances"));
        assert_eq!(&args[args.len() - 2..], ["rdepends", "libbase"]);
    }

    #[test]
    fn test_parse_rdepends_no_dependents() {
        assert!(parse_rdepends("xubuntu-desktop\nReverse Depends:\n").is_empty());
        assert!(parse_rdepends("").is_empty());
    }

    #[test]
    fn test_missing_program_is_lookup_error() {
        let apt = AptCache::with_program("/nonexistent/apt-cache");
        let result = apt.reverse_dependents("abiword");
        assert!(matches!(result, Err(Error::OracleLookup { .. })));
    }
}
