//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for each turn phase.
//!
//! Template loading chain:
//! 1. `<worktree>/.plancouncil/prompts/{name}.pmt` (project override)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::{PlanEntry, PromptContext, PromptKind, PromptLoader};
