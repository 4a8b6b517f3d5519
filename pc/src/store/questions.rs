//! Detection of unanswered questions in a plan artifact
//!
//! Synthesized plans may end with a `## Questions` section in which every
//! question carries an `**Answer:**` marker for the human to fill in.
//! Approval is gated on every marker having an answer.

use tracing::debug;

const QUESTIONS_HEADING: &str = "## questions";
const ANSWER_MARKER: &str = "**Answer:**";

/// True if the `## Questions` section has at least one empty answer
///
/// An answer is missing when nothing but whitespace follows the marker on its
/// own line and the next line is end-of-file, blank, a heading or a divider.
pub fn has_unanswered_questions(text: &str) -> bool {
    let lines: Vec<&str> = text.lines().collect();

    let Some(start) = lines
        .iter()
        .position(|line| line.trim().to_lowercase().starts_with(QUESTIONS_HEADING))
    else {
        debug!("has_unanswered_questions: no questions section");
        return false;
    };

    let end = lines[start + 1..]
        .iter()
        .position(|line| is_section_heading(line))
        .map(|offset| start + 1 + offset)
        .unwrap_or(lines.len());

    for idx in start + 1..end {
        let line = lines[idx];
        let Some(pos) = line.find(ANSWER_MARKER) else {
            continue;
        };

        let rest = &line[pos + ANSWER_MARKER.len()..];
        if !rest.trim().is_empty() {
            continue;
        }

        let missing = match lines.get(idx + 1) {
            None => true,
            Some(next) if idx + 1 >= end => {
                debug!(next, "has_unanswered_questions: marker ends the section");
                true
            }
            Some(next) => next.trim().is_empty() || is_heading(next) || is_divider(next),
        };

        if missing {
            debug!(line = idx + 1, "has_unanswered_questions: found empty answer");
            return true;
        }
    }
    false
}

/// Headings that close the questions section (level 1 or 2)
fn is_section_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("# ") || trimmed.starts_with("## ")
}

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn is_divider(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3
        && (trimmed.chars().all(|c| c == '-') || trimmed.chars().all(|c| c == '*') || trimmed.chars().all(|c| c == '_'))
}
