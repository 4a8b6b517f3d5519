//! Turn orchestration error types

use thiserror::Error;

use crate::domain::{InvalidTransition, Phase};
use crate::store::StoreError;

/// Errors from running or inspecting a turn
///
/// Worker failures are not errors here: they are recorded in session state
/// and only fail the turn (`run_turn` returning false) when no worker drafts.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Session {session} is {phase}; no further turns can run")]
    TerminalPhase { session: String, phase: Phase },

    #[error("Session {session} is {phase}: {reason}")]
    InvalidPhase {
        session: String,
        phase: Phase,
        reason: &'static str,
    },

    /// Nothing to compare, as opposed to an empty diff
    #[error("Diff not available: {reason}")]
    DiffUnavailable { reason: String },

    #[error("Session {0} has unanswered questions")]
    UnansweredQuestions(String),

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl TurnError {
    pub fn is_diff_unavailable(&self) -> bool {
        matches!(self, TurnError::DiffUnavailable { .. })
    }
}

impl From<eyre::Report> for TurnError {
    fn from(report: eyre::Report) -> Self {
        TurnError::Prompt(report.to_string())
    }
}
