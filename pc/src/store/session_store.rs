//! SessionStore - durable sessions as directories of YAML and Markdown
//!
//! Each session lives in `<sessions-dir>/<session-id>/` (see [`SessionPaths`]).
//! `meta.yml` is written once at creation; `state.yml` is rewritten
//! atomically on every save. Both are plain YAML and safe to hand-edit
//! between turns.
//!
//! The store takes no locks: callers must not run two turns of the same
//! session concurrently.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::atomic::write_atomic;
use super::error::StoreError;
use super::layout::SessionPaths;
use super::questions::has_unanswered_questions;
use crate::config::Config;
use crate::domain::names;
use crate::domain::{Session, SessionMeta, SessionState};

/// File-backed session store
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions_dir: PathBuf,
}

impl SessionStore {
    /// Open a store rooted at `sessions_dir` (created lazily)
    pub fn new(sessions_dir: impl AsRef<Path>) -> Self {
        let sessions_dir = sessions_dir.as_ref().to_path_buf();
        debug!(?sessions_dir, "SessionStore::new: called");
        Self { sessions_dir }
    }

    /// Open the store configured in `config`
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.sessions_dir)
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// File layout for a session id
    pub fn paths(&self, session_id: &str) -> SessionPaths {
        SessionPaths::new(&self.sessions_dir, session_id)
    }

    /// Create a new session with a freshly allocated id
    ///
    /// The config is frozen into the session metadata.
    pub fn create_session(&self, task: &str, worktree: &Path, config: &Config) -> Result<Session, StoreError> {
        debug!(task_len = task.len(), ?worktree, "SessionStore::create_session: called");
        fs::create_dir_all(&self.sessions_dir).map_err(|e| StoreError::io(&self.sessions_dir, e))?;

        let id = names::allocate_name(|candidate| self.paths(candidate).root().exists());
        let paths = self.paths(&id);
        fs::create_dir_all(paths.root()).map_err(|e| StoreError::io(paths.root(), e))?;

        let meta = SessionMeta {
            task: task.to_string(),
            worktree: worktree.to_path_buf(),
            created_at: Utc::now(),
            config: config.clone(),
        };
        let state = SessionState::new(config.enabled_workers().map(|w| w.id.clone()));

        write_yaml(&paths.meta(), &meta)?;
        let mut session = Session { id, meta, state };
        self.save_state(&mut session, true)?;

        info!(session = %session.id, "Created session");
        Ok(session)
    }

    /// Load a session by id
    ///
    /// Returns `Ok(None)` if no such session exists. A session whose metadata
    /// or state cannot be parsed is an error, never silently coerced.
    pub fn load_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        debug!(%session_id, "SessionStore::load_session: called");
        if !is_valid_id(session_id) {
            debug!(%session_id, "SessionStore::load_session: invalid id");
            return Ok(None);
        }

        let paths = self.paths(session_id);
        let meta_path = paths.meta();
        if !meta_path.exists() {
            debug!(?meta_path, "SessionStore::load_session: no metadata");
            return Ok(None);
        }

        let meta: SessionMeta = read_yaml(&meta_path)?;
        let state_path = paths.state();
        if !state_path.exists() {
            return Err(StoreError::Malformed {
                path: state_path,
                reason: "state file is missing".to_string(),
            });
        }
        let state: SessionState = read_yaml(&state_path)?;

        Ok(Some(Session {
            id: session_id.to_string(),
            meta,
            state,
        }))
    }

    /// Load a session that must exist
    pub fn require_session(&self, session_id: &str) -> Result<Session, StoreError> {
        self.load_session(session_id)?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))
    }

    /// Persist the mutable state, optionally refreshing `updated_at`
    pub fn save_state(&self, session: &mut Session, touch: bool) -> Result<(), StoreError> {
        debug!(session = %session.id, phase = %session.phase(), touch, "SessionStore::save_state: called");
        if touch {
            session.touch();
        }
        write_yaml(&self.paths(&session.id).state(), &session.state)
    }

    /// All sessions, most recently updated first
    ///
    /// Session directories that fail to load are skipped with a warning.
    pub fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        debug!(sessions_dir = ?self.sessions_dir, "SessionStore::list_sessions: called");
        if !self.sessions_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.sessions_dir).map_err(|e| StoreError::io(&self.sessions_dir, e))?;
        let mut sessions = Vec::new();

        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match self.load_session(&id) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => debug!(%id, "list_sessions: not a session directory"),
                Err(e) => warn!(%id, error = %e, "list_sessions: skipping unreadable session"),
            }
        }

        sessions.sort_by(|a, b| b.state.updated_at.cmp(&a.state.updated_at));
        debug!(count = sessions.len(), "list_sessions: loaded sessions");
        Ok(sessions)
    }

    /// Remove a session directory and everything in it
    pub fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        debug!(%session_id, "SessionStore::delete_session: called");
        if !is_valid_id(session_id) {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        let paths = self.paths(session_id);
        if !paths.root().exists() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        fs::remove_dir_all(paths.root()).map_err(|e| StoreError::io(paths.root(), e))?;
        info!(session = %session_id, "Deleted session");
        Ok(())
    }

    /// Return the session token, generating and persisting one if absent
    pub fn ensure_session_token(&self, session_id: &str) -> Result<String, StoreError> {
        debug!(%session_id, "SessionStore::ensure_session_token: called");
        let mut session = self.require_session(session_id)?;
        if let Some(token) = &session.state.session_token {
            return Ok(token.clone());
        }

        let token = names::generate_token();
        session.state.session_token = Some(token.clone());
        self.save_state(&mut session, false)?;
        debug!(%session_id, "ensure_session_token: generated new token");
        Ok(token)
    }

    /// True if the current turn's artifact has an unanswered question
    pub fn has_questions(&self, session_id: &str) -> Result<bool, StoreError> {
        debug!(%session_id, "SessionStore::has_questions: called");
        let session = self.require_session(session_id)?;
        match self.read_artifact(session_id, session.turn())? {
            Some(text) => Ok(has_unanswered_questions(&text)),
            None => Ok(false),
        }
    }

    /// Read a turn's artifact, `None` if it has not been written
    pub fn read_artifact(&self, session_id: &str, turn: u32) -> Result<Option<String>, StoreError> {
        read_optional(&self.paths(session_id).artifact(turn))
    }

    /// Read a turn's pre-edit snapshot, `None` if it has not been written
    pub fn read_snapshot(&self, session_id: &str, turn: u32) -> Result<Option<String>, StoreError> {
        read_optional(&self.paths(session_id).snapshot(turn))
    }
}

/// Session ids are single path components
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_yaml::from_str(&content).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_yaml::to_string(value)?;
    write_atomic(path, content.as_bytes()).map_err(|e| StoreError::io(path, e))
}

/// Read a text file, mapping absence to `None`
fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
