//! Session persistence
//!
//! SessionStore owns the on-disk representation of sessions: YAML metadata
//! and state records, Markdown turn artifacts and per-worker files.

mod atomic;
mod error;
mod layout;
mod questions;
mod session_store;

pub use atomic::write_atomic;
pub use error::StoreError;
pub use layout::{META_FILE, STATE_FILE, SessionPaths};
pub use questions::has_unanswered_questions;
pub use session_store::SessionStore;
