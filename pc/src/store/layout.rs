//! Session file layout
//!
//! Every path a session owns is derived from the sessions directory and the
//! session id, so external tooling can locate artifacts without the store.

use std::path::{Path, PathBuf};

pub const META_FILE: &str = "meta.yml";
pub const STATE_FILE: &str = "state.yml";
const SYNTHESIZER: &str = "synthesizer";

/// Paths for one session directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    root: PathBuf,
}

impl SessionPaths {
    pub fn new(sessions_dir: impl AsRef<Path>, session_id: &str) -> Self {
        Self {
            root: sessions_dir.as_ref().join(session_id),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> PathBuf {
        self.root.join(META_FILE)
    }

    pub fn state(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn turns_dir(&self) -> PathBuf {
        self.root.join("turns")
    }

    /// The human-editable artifact for a turn
    pub fn artifact(&self, turn: u32) -> PathBuf {
        self.turns_dir().join(format!("turn-{:03}.md", turn))
    }

    /// The pre-edit copy of a turn's artifact
    pub fn snapshot(&self, turn: u32) -> PathBuf {
        self.turns_dir().join(format!("turn-{:03}.snapshot.md", turn))
    }

    /// Per-turn directory holding draft and review snapshots
    pub fn turn_dir(&self, turn: u32) -> PathBuf {
        self.turns_dir().join(format!("turn-{:03}", turn))
    }

    pub fn draft(&self, turn: u32, worker_id: &str) -> PathBuf {
        self.turn_dir(turn).join("drafts").join(format!("{}.md", worker_id))
    }

    pub fn review(&self, turn: u32, worker_id: &str) -> PathBuf {
        self.turn_dir(turn).join("reviews").join(format!("{}.md", worker_id))
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.root.join("plans")
    }

    /// A worker's persistent working file, reused turn over turn
    pub fn working_plan(&self, plan_id: &str) -> PathBuf {
        self.plans_dir().join(format!("{}.md", plan_id))
    }

    /// A worker's continuation-token file
    pub fn continuation(&self, plan_id: &str) -> PathBuf {
        self.plans_dir().join(format!("{}.session", plan_id))
    }

    pub fn synthesizer_continuation(&self) -> PathBuf {
        self.continuation(SYNTHESIZER)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn worker_log(&self, plan_id: &str) -> PathBuf {
        self.logs_dir().join(format!("{}.log", plan_id))
    }

    pub fn synthesizer_log(&self) -> PathBuf {
        self.worker_log(SYNTHESIZER)
    }
}
