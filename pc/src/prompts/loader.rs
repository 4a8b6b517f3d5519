//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use super::embedded;

/// Which prompt a phase step needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Turn 1 drafting
    DraftInitial,
    /// Turn 2+ drafting
    DraftRevise,
    PeerReview,
    Synthesize,
}

impl PromptKind {
    /// Get the template name for this prompt
    pub fn template_name(&self) -> &'static str {
        match self {
            Self::DraftInitial => "draft-initial",
            Self::DraftRevise => "draft-revise",
            Self::PeerReview => "peer-review",
            Self::Synthesize => "synthesize",
        }
    }
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.template_name())
    }
}

/// One worker's plan, as shown to the synthesizer
#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub name: String,
    pub text: String,
}

/// Context for rendering prompt templates
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptContext {
    pub task: String,
    pub turn: u32,
    /// File the worker must write its plan to
    pub output_file: String,
    /// Human-edit diff from the previous turn
    pub feedback: Option<String>,
    /// Full plan text, used when there is no feedback diff
    pub current_plan: Option<String>,
    pub own_draft: Option<String>,
    pub peer_name: Option<String>,
    pub peer_draft: Option<String>,
    pub plans: Vec<PlanEntry>,
}

impl PromptContext {
    /// Context for a turn-1 draft
    pub fn draft_initial(task: &str, output_file: &Path) -> Self {
        debug!(?output_file, "PromptContext::draft_initial: called");
        Self {
            task: task.to_string(),
            turn: 1,
            output_file: output_file.display().to_string(),
            ..Default::default()
        }
    }

    /// Context for a turn-N draft
    ///
    /// Without a feedback diff the full current plan is included instead.
    pub fn draft_revise(
        task: &str,
        turn: u32,
        output_file: &Path,
        feedback: Option<&str>,
        current_plan: &str,
    ) -> Self {
        debug!(%turn, has_feedback = feedback.is_some(), "PromptContext::draft_revise: called");
        Self {
            task: task.to_string(),
            turn,
            output_file: output_file.display().to_string(),
            feedback: feedback.map(str::to_string),
            current_plan: Some(current_plan.to_string()),
            ..Default::default()
        }
    }

    /// Context for reviewing a peer's draft
    pub fn peer_review(
        task: &str,
        turn: u32,
        output_file: &Path,
        own_draft: &str,
        peer_name: &str,
        peer_draft: &str,
    ) -> Self {
        debug!(%turn, %peer_name, "PromptContext::peer_review: called");
        Self {
            task: task.to_string(),
            turn,
            output_file: output_file.display().to_string(),
            own_draft: Some(own_draft.to_string()),
            peer_name: Some(peer_name.to_string()),
            peer_draft: Some(peer_draft.to_string()),
            ..Default::default()
        }
    }

    /// Context for merging every final plan
    pub fn synthesize(
        task: &str,
        turn: u32,
        output_file: &Path,
        plans: Vec<PlanEntry>,
        feedback: Option<&str>,
    ) -> Self {
        debug!(%turn, plans = plans.len(), has_feedback = feedback.is_some(), "PromptContext::synthesize: called");
        Self {
            task: task.to_string(),
            turn,
            output_file: output_file.display().to_string(),
            feedback: feedback.map(str::to_string),
            plans,
            ..Default::default()
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// Project override directory (`.plancouncil/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a prompt loader rooted at a worktree
    pub fn new(worktree: impl AsRef<Path>) -> Self {
        let user_dir = worktree.as_ref().join(".plancouncil").join("prompts");
        debug!(?user_dir, exists = user_dir.exists(), "PromptLoader::new: called");
        Self {
            hbs: Self::engine(),
            user_dir: Some(user_dir),
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text; HTML escaping would mangle code and diffs
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks the project override directory first, then the embedded set.
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(user_dir) = &self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in user override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a prompt with the given context
    pub fn render(&self, kind: PromptKind, context: &PromptContext) -> Result<String> {
        let template = self.load_template(kind.template_name())?;
        info!("Rendering template '{}' for turn {}", kind, context.turn);
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", kind, e))
    }
}
