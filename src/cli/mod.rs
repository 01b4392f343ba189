//! CLI interface for viking.
//!
//! Provides command-line argument parsing using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default number of search results to return.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Default glob for `add-dir`.
pub const DEFAULT_PATTERN: &str = "*.md";

/// URI listed by `ls` when none is given.
pub const DEFAULT_LS_URI: &str = "viking://resources";

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "./openviking_data";

/// Command-line interface for viking.
#[derive(Parser)]
#[command(name = "viking")]
#[command(author, version, about = "OpenViking CLI: index, search and browse context", long_about = None)]
pub struct Cli {
    /// Data storage directory.
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Add a file to the index.
    Add {
        /// Path to the file.
        file_path: PathBuf,
    },

    /// Add all matching files from a directory, recursively.
    AddDir {
        /// Directory to scan.
        dir_path: PathBuf,

        /// Glob pattern matched in every subdirectory.
        #[arg(long, default_value = DEFAULT_PATTERN)]
        pattern: String,
    },

    /// Semantic search across indexed content.
    Search {
        /// The search query.
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// List resources at a URI.
    Ls {
        /// URI to list.
        #[arg(default_value = DEFAULT_LS_URI)]
        uri: String,
    },

    /// Show the L0 abstract (one-line summary) of a resource.
    Abstract {
        /// Resource URI.
        uri: String,
    },

    /// Show the L1 overview of a resource.
    Overview {
        /// Resource URI.
        uri: String,
    },

    /// Print the full L2 content of a resource.
    Read {
        /// Resource URI.
        uri: String,
    },

    /// Show status and configuration.
    Info,
}
