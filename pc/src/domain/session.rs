//! Session domain types
//!
//! A session is persisted as two YAML records: [`SessionMeta`] (written once)
//! and [`SessionState`] (rewritten on every change). [`Session`] pairs them
//! with the session id in memory.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::names;
use crate::config::Config;

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Initializing,
    Drafting,
    PeerReview,
    Synthesizing,
    UserReview,
    Approved,
    Error,
}

impl Phase {
    /// Terminal phases accept no further turns
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Error)
    }

    /// Phases a crash can leave a session in mid-turn
    pub fn is_mid_turn(&self) -> bool {
        matches!(self, Self::Drafting | Self::PeerReview | Self::Synthesizing)
    }

    /// Whether `self -> next` is an edge of the session state machine
    ///
    /// Mid-turn phases may restart at `Drafting` (a fresh continue after a
    /// crash) or fail into `Error`.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        use Phase::*;
        let allowed = match (self, next) {
            (Initializing, Drafting) => true,
            (Drafting, PeerReview) => true,
            (PeerReview, Synthesizing) => true,
            (Synthesizing, UserReview) => true,
            (UserReview, Approved) | (UserReview, Error) | (UserReview, Drafting) => true,
            (from, Drafting) | (from, Error) if from.is_mid_turn() => true,
            _ => false,
        };
        debug!(from = %self, to = %next, allowed, "Phase::can_transition_to: called");
        allowed
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Drafting => "drafting",
            Self::PeerReview => "peer_review",
            Self::Synthesizing => "synthesizing",
            Self::UserReview => "user_review",
            Self::Approved => "approved",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Per-worker status within the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    #[default]
    Pending,
    Working,
    Done,
    Error,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Working => "working",
            Self::Done => "done",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Refused phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid phase transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: Phase,
    pub to: Phase,
}

/// Immutable session metadata (`meta.yml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionMeta {
    /// Free-text goal description
    pub task: String,

    /// Project directory worker processes run in
    pub worktree: PathBuf,

    pub created_at: DateTime<Utc>,

    /// Worker configuration frozen at creation time
    pub config: Config,
}

/// Mutable session state (`state.yml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionState {
    /// Current turn, starting at 1
    pub turn: u32,

    pub phase: Phase,

    #[serde(default)]
    pub workers: BTreeMap<String, WorkerStatus>,

    /// worker id -> plan id, assigned once
    #[serde(default)]
    pub worker_plan_ids: BTreeMap<String, String>,

    /// Summaries for workers whose last invocation failed
    #[serde(default)]
    pub worker_errors: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    /// Fresh state for a new session
    pub fn new(worker_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            turn: 1,
            phase: Phase::Initializing,
            workers: worker_ids.into_iter().map(|id| (id, WorkerStatus::Pending)).collect(),
            worker_plan_ids: BTreeMap::new(),
            worker_errors: BTreeMap::new(),
            session_token: None,
            updated_at: Utc::now(),
        }
    }
}

/// One planning session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub meta: SessionMeta,
    pub state: SessionState,
}

impl Session {
    pub fn task(&self) -> &str {
        &self.meta.task
    }

    pub fn turn(&self) -> u32 {
        self.state.turn
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn config(&self) -> &Config {
        &self.meta.config
    }

    /// Move to `next`, refusing edges outside the state machine
    pub fn transition(&mut self, next: Phase) -> Result<(), InvalidTransition> {
        let from = self.state.phase;
        if !from.can_transition_to(next) {
            return Err(InvalidTransition { from, to: next });
        }
        debug!(session = %self.id, %from, to = %next, "Session::transition");
        self.state.phase = next;
        Ok(())
    }

    /// Start the next turn (the external "continue")
    pub fn advance_turn(&mut self) -> Result<(), InvalidTransition> {
        self.transition(Phase::Drafting)?;
        self.state.turn += 1;
        Ok(())
    }

    /// Assign plan ids to enabled workers that have none yet
    ///
    /// Returns true if anything was assigned. Existing ids are never changed.
    pub fn assign_plan_ids(&mut self) -> bool {
        let enabled: Vec<String> = self.meta.config.enabled_workers().map(|w| w.id.clone()).collect();
        let mut taken: HashSet<String> = self.state.worker_plan_ids.values().cloned().collect();
        let mut assigned = false;

        for worker_id in enabled {
            if self.state.worker_plan_ids.contains_key(&worker_id) {
                continue;
            }
            let plan_id = names::allocate_unique(&taken);
            debug!(session = %self.id, %worker_id, %plan_id, "Session::assign_plan_ids: assigned");
            taken.insert(plan_id.clone());
            self.state.worker_plan_ids.insert(worker_id, plan_id);
            assigned = true;
        }
        assigned
    }

    pub fn plan_id(&self, worker_id: &str) -> Option<&str> {
        self.state.worker_plan_ids.get(worker_id).map(String::as_str)
    }

    pub fn set_worker_status(&mut self, worker_id: &str, status: WorkerStatus) {
        self.state.workers.insert(worker_id.to_string(), status);
    }

    pub fn worker_status(&self, worker_id: &str) -> Option<WorkerStatus> {
        self.state.workers.get(worker_id).copied()
    }

    /// Mark a worker done and clear any retained error
    pub fn record_success(&mut self, worker_id: &str) {
        self.set_worker_status(worker_id, WorkerStatus::Done);
        self.state.worker_errors.remove(worker_id);
    }

    /// Mark a worker failed and retain its error summary
    pub fn record_failure(&mut self, worker_id: &str, summary: String) {
        self.set_worker_status(worker_id, WorkerStatus::Error);
        self.state.worker_errors.insert(worker_id.to_string(), summary);
    }

    pub fn worker_error(&self, worker_id: &str) -> Option<&str> {
        self.state.worker_errors.get(worker_id).map(String::as_str)
    }

    /// Refresh `updated_at`
    pub fn touch(&mut self) {
        self.state.updated_at = Utc::now();
    }
}
