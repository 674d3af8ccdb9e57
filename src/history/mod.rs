// src/history/mod.rs

//! Package manager history access
//!
//! This module provides:
//! - Reading apt history logs, including rotated `.gz`/`.xz`/`.zst` files
//! - Locating the `Install:` entry that brought a metapackage in
//! - Parsing that entry into an [`InstallRecord`]

pub mod parser;

pub use parser::{INSTALL_MARKER, InstallRecord, PackageEntry, parse};

use crate::error::{Error, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use xz2::read::XzDecoder;

/// A single line read from a history file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// File the line was read from
    pub source: PathBuf,
    /// 1-based line number within the (decompressed) file
    pub line_number: usize,
    pub text: String,
}

impl LogLine {
    pub fn new(source: impl Into<PathBuf>, line_number: usize, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            line_number,
            text: text.into(),
        }
    }

    /// Whether this line records an installation event
    pub fn is_install_event(&self) -> bool {
        self.text.contains(INSTALL_MARKER)
    }
}

/// Text search over package manager history sources
pub trait LogSource {
    /// Return every line under `path_glob` that contains `pattern`,
    /// in file order then line order
    fn search_logs(&self, pattern: &str, path_glob: &str) -> Result<Vec<LogLine>>;
}

/// Compression used by a history file, detected from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Gzip,
    Xz,
    Zstd,
}

impl Compression {
    fn detect(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("gz") => Compression::Gzip,
            Some("xz") => Compression::Xz,
            Some("zst") => Compression::Zstd,
            _ => Compression::None,
        }
    }
}

/// History files on disk, searched like `zgrep <pattern> <glob>`
#[derive(Debug, Default, Clone, Copy)]
pub struct HistoryFiles;

impl HistoryFiles {
    pub fn new() -> Self {
        Self
    }

    /// Expand a path pattern into the sorted list of regular files it names
    pub fn expand(path_glob: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in glob::glob(path_glob)? {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(path) => debug!("Skipping non-file history path: {}", path.display()),
                Err(e) => debug!("Skipping unreadable history path: {}", e),
            }
        }
        Ok(files)
    }

    /// Open a history file, decompressing according to its extension
    fn open(path: &Path) -> Result<Box<dyn BufRead>> {
        let file = File::open(path).map_err(|source| Error::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let reader: Box<dyn Read> = match Compression::detect(path) {
            Compression::None => Box::new(file),
            Compression::Gzip => Box::new(MultiGzDecoder::new(file)),
            Compression::Xz => Box::new(XzDecoder::new(file)),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(file).map_err(
                |source| Error::ReadError {
                    path: path.to_path_buf(),
                    source,
                },
            )?),
        };

        Ok(Box::new(BufReader::new(reader)))
    }

    /// Collect the lines of one file containing `pattern`
    fn search_file(path: &Path, pattern: &str) -> Result<Vec<LogLine>> {
        let reader = Self::open(path)?;
        let mut matches = Vec::new();

        for (idx, line) in reader.split(b'\n').enumerate() {
            let bytes = line.map_err(|source| Error::ReadError {
                path: path.to_path_buf(),
                source,
            })?;
            // History logs are not guaranteed to be valid UTF-8
            let text = String::from_utf8_lossy(&bytes);
            let text = text.trim_end_matches('\r');
            if text.contains(pattern) {
                matches.push(LogLine::new(path, idx + 1, text));
            }
        }

        Ok(matches)
    }
}

impl LogSource for HistoryFiles {
    fn search_logs(&self, pattern: &str, path_glob: &str) -> Result<Vec<LogLine>> {
        let files = Self::expand(path_glob)?;
        debug!("Searching {} history file(s) for '{}'", files.len(), pattern);

        let mut lines = Vec::new();
        for path in &files {
            lines.extend(Self::search_file(path, pattern)?);
        }
        Ok(lines)
    }
}

/// Finds the history line that installed a package
pub struct Locator<S: LogSource> {
    source: S,
}

impl<S: LogSource> Locator<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Search history under `path` for `package` and return its install line
    ///
    /// Every line mentioning the package is a candidate; the first one that
    /// carries the `Install: ` marker is selected, since only installation
    /// events list the co-installed dependencies with versions.
    pub fn search(&self, package: &str, path: &str) -> Result<LogLine> {
        let candidates = self.source.search_logs(package, path)?;

        if candidates.is_empty() {
            return Err(Error::NotFound {
                package: package.to_string(),
                path: path.to_string(),
            });
        }

        info!("Found {} history line(s) mentioning {}", candidates.len(), package);
        for line in &candidates {
            debug!("{}:{}: {}", line.source.display(), line.line_number, line.text);
        }

        Self::select_install_line(package, candidates)
    }

    fn select_install_line(package: &str, candidates: Vec<LogLine>) -> Result<LogLine> {
        let count = candidates.len();
        match candidates.into_iter().find(LogLine::is_install_event) {
            Some(line) => {
                info!(
                    "Install line for {} found in {} (line {})",
                    package,
                    line.source.display(),
                    line.line_number
                );
                Ok(line)
            }
            None => Err(Error::AmbiguousLog {
                package: package.to_string(),
                candidates: count,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression as GzLevel;
    use flate2::write::GzEncoder;
    use std::io::Write;

    /// In-memory history for locator tests
    struct FakeHistory(Vec<&'static str>);

    impl LogSource for FakeHistory {
        fn search_logs(&self, pattern: &str, _path_glob: &str) -> Result<Vec<LogLine>> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .filter(|(_, text)| text.contains(pattern))
                .map(|(idx, text)| LogLine::new("history.log", idx + 1, *text))
                .collect())
        }
    }

    #[test]
    fn test_locator_selects_first_install_line() {
        let locator = Locator::new(FakeHistory(vec![
            "Commandline: apt-get install xubuntu-desktop",
            "Install: xubuntu-desktop:i386 (2.9), thunar:i386 (1.6.2)",
            "Install: xubuntu-desktop:i386 (2.10)",
        ]));

        let line = locator.search("xubuntu-desktop", "unused").unwrap();
        assert_eq!(line.line_number, 2);
        assert!(line.text.contains("thunar"));
    }

    #[test]
    fn test_locator_not_found() {
        let locator = Locator::new(FakeHistory(vec!["Install: thunar:i386 (1.6.2)"]));
        let result = locator.search("xubuntu-desktop", "/var/log/apt/history*");
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_locator_ambiguous_without_install_marker() {
        let locator = Locator::new(FakeHistory(vec![
            "Commandline: apt-get remove xubuntu-desktop",
            "Remove: xubuntu-desktop:i386 (2.9)",
        ]));

        match locator.search("xubuntu-desktop", "unused") {
            Err(Error::AmbiguousLog { package, candidates }) => {
                assert_eq!(package, "xubuntu-desktop");
                assert_eq!(candidates, 2);
            }
            other => panic!("expected AmbiguousLog, got {:?}", other),
        }
    }

    #[test]
    fn test_compression_detection() {
        assert_eq!(Compression::detect(Path::new("history.log")), Compression::None);
        assert_eq!(Compression::detect(Path::new("history.log.1.gz")), Compression::Gzip);
        assert_eq!(Compression::detect(Path::new("history.log.2.xz")), Compression::Xz);
        assert_eq!(Compression::detect(Path::new("history.log.3.zst")), Compression::Zstd);
    }

    #[test]
    fn test_search_gzip_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.log.1.gz");

        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), GzLevel::default());
        writeln!(encoder, "Start-Date: 2013-07-01  10:00:00").unwrap();
        writeln!(encoder, "Install: openbox:amd64 (3.5.0-7)").unwrap();
        encoder.finish().unwrap();

        let pattern = dir.path().join("history*");
        let lines = HistoryFiles::new()
            .search_logs("openbox", pattern.to_str().unwrap())
            .unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_number, 2);
        assert_eq!(lines[0].text, "Install: openbox:amd64 (3.5.0-7)");
    }

    #[test]
    fn test_search_xz_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.log.2.xz");

        let mut encoder = xz2::write::XzEncoder::new(File::create(&path).unwrap(), 6);
        writeln!(encoder, "Commandline: apt-get install lxde").unwrap();
        writeln!(encoder, "Install: lxde:i386 (0.5.0-4ubuntu4), lxpanel:i386 (0.5.12-0ubuntu1, automatic)").unwrap();
        encoder.finish().unwrap();

        let pattern = dir.path().join("history*");
        let line = Locator::new(HistoryFiles::new())
            .search("lxde", pattern.to_str().unwrap())
            .unwrap();

        assert_eq!(line.line_number, 2);
        assert_eq!(parse(&line.text).len(), 2);
    }

    #[test]
    fn test_search_zstd_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.log.3.zst");

        let mut encoder = zstd::stream::write::Encoder::new(File::create(&path).unwrap(), 0).unwrap();
        writeln!(encoder, "Start-Date: 2021-03-14  09:12:40").unwrap();
        writeln!(encoder, "Install: kubuntu-desktop:amd64 (1.418), dolphin:amd64 (4:20.12.3-0ubuntu1, automatic)").unwrap();
        encoder.finish().unwrap();

        let pattern = dir.path().join("history*");
        let line = Locator::new(HistoryFiles::new())
            .search("kubuntu-desktop", pattern.to_str().unwrap())
            .unwrap();

        assert!(line.source.ends_with("history.log.3.zst"));
        assert_eq!(line.line_number, 2);
        let record = parse(&line.text);
        assert_eq!(record.get("dolphin").unwrap().version, "4:20.12.3-0ubuntu1, automatic");
    }

    #[test]
    fn test_search_invalid_pattern() {
        let result = HistoryFiles::new().search_logs("openbox", "/var/log/apt/[history");
        assert!(matches!(result, Err(Error::Glob(_))));
    }
}
