// src/resolver/mod.rs

//! Removal decisions
//!
//! A package pulled in by a metapackage may be purged only if nothing the
//! user keeps depends on it. For each package the reverse-dependency oracle
//! lists every dependent (direct or indirect, installed or not). A dependent
//! blocks removal when it is installed and is not itself part of the
//! candidate set being removed.
//!
//! Lookup failures for individual packages are tolerated and the package is
//! skipped, but once [`MAX_LOOKUP_FAILURES`] accumulate in a run the whole
//! run is aborted: at that point the package database has drifted too far
//! from the history log for the result to be trusted.

use crate::error::{Error, Result};
use crate::history::InstallRecord;
use crate::oracle::{InstallationOracle, ReverseDependencyOracle};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Number of failed reverse-dependency lookups that aborts a run
pub const MAX_LOOKUP_FAILURES: usize = 3;

/// Decision for one package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Remove,
    Keep,
}

impl Classification {
    pub fn as_str(&self) -> &str {
        match self {
            Classification::Remove => "remove",
            Classification::Keep => "keep",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First dependent that prevents removal, if any
///
/// Dependents that are removal candidates themselves never block, and
/// neither do dependents that are merely known to the archive but not
/// installed. Multi-arch dependents (`libfoo:i386`) are matched against the
/// candidate set by their bare name.
pub fn find_blocker<'a, I>(
    reverse_deps: &'a [String],
    candidates: &HashSet<String>,
    installed: &I,
) -> Option<&'a str>
where
    I: InstallationOracle + ?Sized,
{
    reverse_deps
        .iter()
        .map(String::as_str)
        .find(|dep| !candidates.contains(bare_name(dep)) && installed.is_installed(dep))
}

/// Package name without its `:arch` qualifier
fn bare_name(package: &str) -> &str {
    package.split_once(':').map_or(package, |(name, _)| name)
}

/// Classify one package from its reverse dependencies
///
/// A package with no dependents at all (a leaf, or the metapackage itself)
/// is always removable. Otherwise a single installed dependent outside the
/// candidate set vetoes removal, regardless of where it appears in the list.
pub fn classify<I>(
    reverse_deps: &[String],
    candidates: &HashSet<String>,
    installed: &I,
) -> Classification
where
    I: InstallationOracle + ?Sized,
{
    match find_blocker(reverse_deps, candidates, installed) {
        Some(_) => Classification::Keep,
        None => Classification::Remove,
    }
}

/// Outcome of resolving one install record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalPlan {
    /// Packages safe to purge, in install-record order
    pub obsolete: Vec<String>,
    /// Packages that something still needs
    pub kept: Vec<String>,
    /// Packages whose reverse dependencies could not be looked up
    pub skipped: Vec<String>,
}

impl RemovalPlan {
    pub fn is_empty(&self) -> bool {
        self.obsolete.is_empty()
    }
}

/// Runs the classifier over every package of an install record
pub struct Resolver<'a, R: ?Sized, I: ?Sized> {
    reverse_deps: &'a R,
    installed: &'a I,
    jobs: usize,
}

impl<'a, R, I> Resolver<'a, R, I>
where
    R: ReverseDependencyOracle + ?Sized,
    I: InstallationOracle + ?Sized,
{
    pub fn new(reverse_deps: &'a R, installed: &'a I) -> Self {
        Self {
            reverse_deps,
            installed,
            jobs: 1,
        }
    }

    /// Number of concurrent lookups; 0 lets rayon decide, 1 is sequential
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Decide which packages of `record` can be purged
    pub fn resolve(&self, record: &InstallRecord) -> Result<RemovalPlan> {
        let names: Vec<&str> = record.names().collect();
        let candidates: HashSet<String> = names.iter().map(|name| name.to_string()).collect();

        info!(
            "Computing which of {} packages can be removed without breaking kept packages",
            names.len()
        );

        if self.jobs == 1 {
            let lookups = names
                .iter()
                .map(|&name| (name, self.reverse_deps.reverse_dependents(name)));
            return self.tally(lookups, &candidates);
        }

        let lookup = || -> Vec<Result<Vec<String>>> {
            names
                .par_iter()
                .map(|&name| self.reverse_deps.reverse_dependents(name))
                .collect()
        };

        let results = if self.jobs == 0 {
            lookup()
        } else {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .map_err(|e| {
                    Error::Config(format!("cannot start {} lookup threads: {}", self.jobs, e))
                })?
                .install(lookup)
        };

        self.tally(names.iter().copied().zip(results), &candidates)
    }

    /// Classify lookup results in record order, counting failures
    fn tally<'n>(
        &self,
        lookups: impl Iterator<Item = (&'n str, Result<Vec<String>>)>,
        candidates: &HashSet<String>,
    ) -> Result<RemovalPlan> {
        let mut plan = RemovalPlan::default();
        let mut failures = 0;

        for (name, lookup) in lookups {
            let reverse_deps = match lookup {
                Ok(deps) => deps,
                Err(e) => {
                    failures += 1;
                    warn!("Skipping {}: {} (failure {} of {})", name, e, failures, MAX_LOOKUP_FAILURES);
                    if failures >= MAX_LOOKUP_FAILURES {
                        return Err(Error::TooManyLookupFailures { count: failures });
                    }
                    plan.skipped.push(name.to_string());
                    continue;
                }
            };

            match find_blocker(&reverse_deps, candidates, self.installed) {
                Some(blocker) => {
                    debug!("keep {}: needed by installed package {}", name, blocker);
                    plan.kept.push(name.to_string());
                }
                None => {
                    debug!("remove {}", name);
                    plan.obsolete.push(name.to_string());
                }
            }
        }

        info!(
            "{} packages can be purged, {} are kept, {} were skipped",
            plan.obsolete.len(),
            plan.kept.len(),
            plan.skipped.len()
        );
        Ok(plan)
    }
}
