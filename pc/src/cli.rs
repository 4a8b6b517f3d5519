//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// PlanCouncil - multi-agent plan convergence
#[derive(Debug, Parser)]
#[command(
    name = "pc",
    about = "Converge on a plan with a council of coding agents",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Override the sessions directory
    #[arg(long = "sessions-dir", global = true)]
    pub sessions_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a session and run its first turn
    New {
        /// Task description
        task: String,

        /// Project directory the workers run in (default: current directory)
        #[arg(short, long)]
        worktree: Option<PathBuf>,

        /// Create the session without running a turn
        #[arg(long)]
        no_run: bool,
    },

    /// Run the session's current turn
    Turn {
        /// Session id
        id: String,
    },

    /// Start the next turn (or restart an interrupted one)
    Continue {
        /// Session id
        id: String,
    },

    /// Approve the current plan
    Approve {
        /// Session id
        id: String,
    },

    /// Show what changed between the last two turns
    Diff {
        /// Session id
        id: String,
    },

    /// Show a session's phase and worker status
    Status {
        /// Session id
        id: String,
    },

    /// List sessions, most recently updated first
    List,

    /// Delete a session and all its files
    Delete {
        /// Session id
        id: String,
    },
}
