//! Text diffs between turn artifacts
//!
//! Two diffs exist: the human-feedback diff (a turn's post-synthesis snapshot
//! against the same turn's possibly edited artifact) and the turn-over-turn
//! diff shown to callers (previous artifact against current artifact).

use similar::{DiffTag, TextDiff};
use tracing::debug;

/// Lines of unchanged context around each hunk
pub const CONTEXT_LINES: usize = 3;

/// Unified diff of `old` against `new`; empty when the texts match line for line
pub fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    if diff.ops().iter().all(|op| op.tag() == DiffTag::Equal) {
        debug!(old_label, new_label, "unified_diff: no changes");
        return String::new();
    }
    diff.unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(old_label, new_label)
        .to_string()
}

/// What the human changed in the previous turn's artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// First turn, no edits, or nothing to compare
    None,
    /// Unified diff of snapshot against edited artifact
    Diff(String),
    /// No snapshot was kept, so the whole artifact stands in for the diff
    FullText(String),
}

impl Feedback {
    /// Compute feedback from the previous turn's snapshot and artifact
    pub fn from_previous_turn(snapshot: Option<&str>, artifact: Option<&str>) -> Self {
        match (snapshot, artifact) {
            (Some(snapshot), Some(artifact)) => {
                let diff = unified_diff(snapshot, artifact, "snapshot", "edited");
                if diff.is_empty() {
                    debug!("Feedback::from_previous_turn: artifact unedited");
                    Feedback::None
                } else {
                    debug!(diff_len = diff.len(), "Feedback::from_previous_turn: artifact edited");
                    Feedback::Diff(diff)
                }
            }
            (None, Some(artifact)) => {
                debug!("Feedback::from_previous_turn: no snapshot, using full artifact");
                Feedback::FullText(artifact.to_string())
            }
            (_, None) => {
                debug!("Feedback::from_previous_turn: no artifact");
                Feedback::None
            }
        }
    }

    /// Text to place in prompts, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Feedback::None => None,
            Feedback::Diff(text) | Feedback::FullText(text) => Some(text),
        }
    }

    pub fn is_some(&self) -> bool {
        !matches!(self, Feedback::None)
    }
}
