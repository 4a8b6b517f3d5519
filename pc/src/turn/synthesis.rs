//! Mechanical synthesis fallback

use tracing::debug;

use crate::prompts::PlanEntry;

/// Concatenate each plan under a labeled heading
///
/// Used when the synthesizer fails. Never returns empty text.
pub fn fallback_concatenation(plans: &[PlanEntry]) -> String {
    debug!(plans = plans.len(), "fallback_concatenation: called");
    let mut out = String::from("# Combined plans\n\nThe synthesizer was unavailable; each worker's plan follows unmerged.\n");
    for plan in plans {
        out.push_str(&format!("\n## {}\n\n", plan.name));
        let text = plan.text.trim();
        if text.is_empty() {
            out.push_str("_(empty plan)_\n");
        } else {
            out.push_str(text);
            out.push('\n');
        }
    }
    out
}
