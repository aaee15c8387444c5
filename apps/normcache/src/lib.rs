//! # normcache
//!
//! Command-line front end for `normcache-core`: configuration loading and
//! the command implementations used by the `normcache` binary.

pub mod cli;
pub mod config;
