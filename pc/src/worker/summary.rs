//! Short error summaries for failed workers

/// Longest summary kept in session state
pub const MAX_SUMMARY_CHARS: usize = 200;

/// Lowercase fragments that mark a line as the interesting one
const ERROR_SIGNALS: &[&str] = &[
    "error:",
    "unexpected argument",
    "invalid option",
    "command not found",
    "permission denied",
    "timeout",
];

fn has_error_signal(line: &str) -> bool {
    let lower = line.to_lowercase();
    ERROR_SIGNALS.iter().any(|signal| lower.contains(signal))
}

/// Reduce raw worker output to one human-scannable line
///
/// Picks the first line carrying a known error signal, else the first
/// non-empty line, else a truncated prefix of the raw text.
pub fn summarize_error(raw: &str) -> String {
    if let Some(line) = raw.lines().find(|line| has_error_signal(line)) {
        return truncate(line.trim(), MAX_SUMMARY_CHARS);
    }
    if let Some(line) = raw.lines().find(|line| !line.trim().is_empty()) {
        return truncate(line.trim(), MAX_SUMMARY_CHARS);
    }
    truncate(raw.trim(), MAX_SUMMARY_CHARS)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}
