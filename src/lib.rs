// src/lib.rs

//! Metapurge
//!
//! Removes a metapackage (xubuntu-desktop, kubuntu-desktop, ...) together
//! with the packages it pulled in, while keeping every package that software
//! you still use depends on.
//!
//! # Architecture
//!
//! - History: find the apt `Install:` line that brought the metapackage in
//!   and parse it into an ordered package record
//! - Oracles: reverse dependencies from apt-cache, installed state from dpkg
//! - Resolver: a package is purged only if no installed package outside the
//!   removal set depends on it
//! - Purge: hand the obsolete set to apt-get

pub mod config;
mod error;
pub mod history;
pub mod oracle;
pub mod purge;
pub mod resolver;

pub use error::{Error, Result};
