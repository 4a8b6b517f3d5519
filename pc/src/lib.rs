//! PlanCouncil - multi-agent turn-based plan convergence
//!
//! Several external agent CLIs draft a plan for the same task, review each
//! other's drafts in a ring, and a synthesizer merges the results into one
//! Markdown artifact. A human edits or approves the artifact; their edits are
//! diffed and fed back into the next turn.
//!
//! # Modules
//!
//! - [`config`] - Worker configuration and loading
//! - [`domain`] - Session, phase state machine, name allocation
//! - [`store`] - Durable session files
//! - [`worker`] - Agent CLI adapters
//! - [`prompts`] - Prompt templates
//! - [`turn`] - Turn orchestration
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod prompts;
pub mod store;
pub mod turn;
pub mod worker;

// Re-export commonly used types
pub use config::{Config, WorkerConfig, WorkerFamily};
pub use domain::{Phase, Session, SessionMeta, SessionState, WorkerStatus};
pub use store::{SessionPaths, SessionStore, StoreError};
pub use turn::{TurnError, TurnOrchestrator};
pub use worker::{AdapterFactory, Invocation, WorkerAdapter, WorkerError, create_adapter};
