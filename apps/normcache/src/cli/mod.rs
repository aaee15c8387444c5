//! # normcache CLI Module
//!
//! This module implements the CLI interface for normcache.
//!
//! ## Available Commands
//!
//! - `init` - Create an empty store
//! - `status` - Show store metrics
//! - `write` - Write a result tree through a selection document
//! - `read` - Read a selection document from the store
//! - `inspect` - Print one entity record
//! - `evict` - Remove one entity record
//! - `export` - Export the store to a file
//! - `import` - Merge a snapshot file into the store
//! - `hash` - Compute the checksum and BLAKE3 hash of the store
//! - `compact` - Compact a redb store file

mod commands;

use crate::config::{Backend, Config};
use clap::{Parser, Subcommand, ValueEnum};
use normcache_core::CacheError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// normcache - normalized result cache
///
/// Flattens tree-shaped query results into entity records and rebuilds
/// results from them.
#[derive(Parser, Debug)]
#[command(name = "normcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to normcache.toml
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the store file (overrides [store] path)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides [store] backend)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Export file formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Canonical binary snapshot with checksum
    #[default]
    Canonical,
    /// Pretty-printed JSON snapshot
    Json,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty store
    Init {
        /// Overwrite an existing store
        #[arg(short, long)]
        force: bool,
    },

    /// Show store metrics
    Status,

    /// Write a result tree into the store
    Write {
        /// Selection document (JSON)
        #[arg(short = 'd', long)]
        document: PathBuf,

        /// Result tree (JSON object)
        #[arg(short = 'r', long)]
        data: PathBuf,

        /// Variables (JSON object)
        #[arg(long)]
        variables: Option<PathBuf>,

        /// Root entity id (operations default to ROOT_QUERY; required for fragments)
        #[arg(short, long)]
        id: Option<String>,

        /// Fragment to write through when the document defines several
        #[arg(short, long)]
        fragment: Option<String>,
    },

    /// Read a selection document from the store
    Read {
        /// Selection document (JSON)
        #[arg(short = 'd', long)]
        document: PathBuf,

        /// Variables (JSON object)
        #[arg(long)]
        variables: Option<PathBuf>,

        /// Root entity id (operations default to ROOT_QUERY; required for fragments)
        #[arg(short, long)]
        id: Option<String>,

        /// Fragment to read through when the document defines several
        #[arg(short, long)]
        fragment: Option<String>,

        /// Previous result (JSON object) backing missing fields
        #[arg(short, long)]
        previous: Option<PathBuf>,

        /// Report missing data instead of failing on it
        #[arg(long)]
        diff: bool,
    },

    /// Print one entity record
    Inspect {
        /// Entity id
        #[arg(short, long)]
        id: String,
    },

    /// Remove one entity record
    Evict {
        /// Entity id
        #[arg(short, long)]
        id: String,
    },

    /// Export the store to a file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Canonical)]
        format: ExportFormat,
    },

    /// Merge a canonical or JSON snapshot into the store
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Compute the checksum and BLAKE3 hash of the store
    Hash {
        /// Check the store against this BLAKE3 hash instead of printing
        #[arg(long)]
        verify: Option<String>,
    },

    /// Compact a redb store file
    Compact,
}

// =============================================================================
// COMMAND DISPATCH
// =============================================================================

/// Load the configuration named by the command line and apply its
/// overrides.
pub fn resolve_config(cli: &Cli) -> Result<Config, CacheError> {
    Ok(Config::load(cli.config.as_deref())?
        .with_overrides(cli.database.clone(), cli.backend))
}

/// Execute a CLI command.
pub fn execute(command: Option<Commands>, config: &Config, json_mode: bool) -> Result<(), CacheError> {
    match command {
        Some(Commands::Init { force }) => cmd_init(config, force),
        Some(Commands::Status) => cmd_status(config, json_mode),
        Some(Commands::Write {
            document,
            data,
            variables,
            id,
            fragment,
        }) => cmd_write(
            config,
            json_mode,
            &WriteArgs {
                document: &document,
                data: &data,
                variables: variables.as_deref(),
                id: id.as_deref(),
                fragment: fragment.as_deref(),
            },
        ),
        Some(Commands::Read {
            document,
            variables,
            id,
            fragment,
            previous,
            diff,
        }) => cmd_read(
            config,
            json_mode,
            &ReadArgs {
                document: &document,
                variables: variables.as_deref(),
                id: id.as_deref(),
                fragment: fragment.as_deref(),
                previous: previous.as_deref(),
                diff,
            },
        ),
        Some(Commands::Inspect { id }) => cmd_inspect(config, json_mode, &id),
        Some(Commands::Evict { id }) => cmd_evict(config, &id),
        Some(Commands::Export { output, format }) => cmd_export(config, &output, format),
        Some(Commands::Import { input }) => cmd_import(config, &input),
        Some(Commands::Hash { verify }) => cmd_hash(config, json_mode, verify.as_deref()),
        Some(Commands::Compact) => cmd_compact(config),
        None => {
            // No subcommand - show status by default
            cmd_status(config, json_mode)
        }
    }
}
