// src/history/parser.rs

//! Install-line parser
//!
//! Turns the `Install:` entry of an apt history log into an ordered
//! [`InstallRecord`]. A line looks like:
//!
//! ```text
//! /var/log/apt/history.log.7.gz:Install: lightdm-gtk-greeter:i386 (1.3.1-0ubuntu1), pidgin-libnotify:i386 (0.14-4ubuntu11, automatic)
//! ```

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

/// Marker that introduces the package list of an installation event
pub const INSTALL_MARKER: &str = "Install: ";

/// One `name:arch (version)` token.
///
/// The name may be any run of non-colon, non-whitespace characters, which
/// covers the usual alphanumerics, dot, dash, underscore and plus as well as
/// anything stranger a repository might ship. The version keeps any
/// `, automatic` qualifier verbatim.
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<name>[^:\s]+):
        (?P<arch>i?\d{3}|amd64|arm64|armhf|armel|ppc64el|s390x|mips64el|riscv64|all)[\x20]
        \((?P<version>[^)]*)\),?
        ",
    )
    .expect("install token pattern is valid")
});

/// Architecture and version of one installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageEntry {
    pub name: String,
    pub architecture: String,
    pub version: String,
}

impl PackageEntry {
    pub fn new(name: &str, architecture: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            architecture: architecture.to_string(),
            version: version.to_string(),
        }
    }

    /// Render the entry back in history-log form: `name:arch (version)`
    pub fn to_token(&self) -> String {
        format!("{}:{} ({})", self.name, self.architecture, self.version)
    }
}

/// Packages of one installation event, in the order apt logged them
///
/// Names are unique. Inserting a name that is already present replaces its
/// architecture and version but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallRecord {
    entries: Vec<PackageEntry>,
    index: HashMap<String, usize>,
}

impl InstallRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry (last write wins, first position kept)
    pub fn insert(&mut self, entry: PackageEntry) {
        match self.index.get(&entry.name) {
            Some(&pos) => {
                debug!("Package '{}' listed twice; keeping the later entry", entry.name);
                self.entries[pos] = entry;
            }
            None => {
                self.index.insert(entry.name.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&PackageEntry> {
        self.index.get(name).map(|&pos| &self.entries[pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageEntry> {
        self.entries.iter()
    }

    /// Package names in record order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Render the record as the package list of an `Install:` line
    pub fn to_line(&self) -> String {
        self.entries
            .iter()
            .map(PackageEntry::to_token)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Parse an `Install:` history line into an [`InstallRecord`]
///
/// Everything up to and including the install marker (file name prefix,
/// timestamps) is discarded. Tokens that do not fit the
/// `name:arch (version)` shape are skipped instead of failing the parse.
pub fn parse(line: &str) -> InstallRecord {
    let packages = match line.find(INSTALL_MARKER) {
        Some(pos) => &line[pos + INSTALL_MARKER.len()..],
        None => line,
    };

    let mut record = InstallRecord::new();
    let mut last_end = 0;

    for caps in TOKEN_PATTERN.captures_iter(packages) {
        let Some(whole) = caps.get(0) else { continue };
        log_skipped(&packages[last_end..whole.start()]);
        last_end = whole.end();

        record.insert(PackageEntry::new(&caps["name"], &caps["arch"], &caps["version"]));
    }
    log_skipped(&packages[last_end..]);

    record
}

fn log_skipped(gap: &str) {
    let gap = gap.trim_matches(|c: char| c == ',' || c.is_whitespace());
    if !gap.is_empty() {
        debug!("Skipping unrecognised install token: {}", gap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XUBUNTU_LINE: &str = "/var/log/apt/history.log.7.gz:Install: \
        lightdm-gtk-greeter:i386 (1.3.1-0ubuntu1), \
        pidgin-libnotify:i386 (0.14-4ubuntu11, automatic), \
        libgpgme++2:i386 (4.9.2-0ubuntu1, automatic), \
        libxfcegui4-4:i386 (4.10.0-1, automatic)";

    #[test]
    fn test_parse_name_arch_version() {
        let record = parse(XUBUNTU_LINE);
        assert_eq!(
            record.get("lightdm-gtk-greeter"),
            Some(&PackageEntry::new("lightdm-gtk-greeter", "i386", "1.3.1-0ubuntu1"))
        );
    }

    #[test]
    fn test_parse_keeps_automatic_qualifier() {
        let record = parse(XUBUNTU_LINE);
        assert_eq!(record.get("pidgin-libnotify").unwrap().version, "0.14-4ubuntu11, automatic");
        assert_eq!(record.get("libxfcegui4-4").unwrap().version, "4.10.0-1, automatic");
    }

    #[test]
    fn test_parse_plus_in_name() {
        let record = parse(XUBUNTU_LINE);
        let entry = record.get("libgpgme++2").unwrap();
        assert_eq!(entry.architecture, "i386");
        assert_eq!(entry.version, "4.9.2-0ubuntu1, automatic");
    }

    #[test]
    fn test_parse_preserves_order() {
        let record = parse(XUBUNTU_LINE);
        let names: Vec<&str> = record.names().collect();
        assert_eq!(
            names,
            vec!["lightdm-gtk-greeter", "pidgin-libnotify", "libgpgme++2", "libxfcegui4-4"]
        );
    }

    #[test]
    fn test_parse_without_prefix() {
        let record = parse(
            "lightdm-gtk-greeter:i386 (1.3.1-0ubuntu1), pidgin-libnotify:i386 (0.14-4ubuntu11, automatic)",
        );
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("lightdm-gtk-greeter").unwrap().version, "1.3.1-0ubuntu1");
        assert_eq!(record.get("pidgin-libnotify").unwrap().version, "0.14-4ubuntu11, automatic");
    }

    #[test]
    fn test_parse_amd64_and_all() {
        let record = parse("Install: xfce4-panel:amd64 (4.16.3-1), fonts-lyx:all (2.3.6-1, automatic)");
        assert_eq!(record.get("xfce4-panel").unwrap().architecture, "amd64");
        assert_eq!(record.get("fonts-lyx").unwrap().architecture, "all");
    }

    #[test]
    fn test_parse_skips_malformed_tokens() {
        let record = parse("Install: good:i386 (1.0), broken-token, other:sparc (2.0), last:amd64 (3.0)");
        let names: Vec<&str> = record.names().collect();
        assert_eq!(names, vec!["good", "last"]);
    }

    #[test]
    fn test_parse_duplicate_last_write_wins() {
        let record = parse("Install: a:i386 (1.0), b:i386 (2.0), a:amd64 (1.1, automatic)");
        assert_eq!(record.len(), 2);
        let names: Vec<&str> = record.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&PackageEntry::new("a", "amd64", "1.1, automatic")));
    }

    #[test]
    fn test_parse_empty_line() {
        assert!(parse("").is_empty());
        assert!(parse("Start-Date: 2013-05-01  10:00:00").is_empty());
    }

    #[test]
    fn test_record_round_trip() {
        let record = parse(XUBUNTU_LINE);
        let reparsed = parse(&format!("{}{}", INSTALL_MARKER, record.to_line()));
        assert_eq!(record, reparsed);
    }
}
