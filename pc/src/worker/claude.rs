//! Claude CLI worker
//!
//! Runs `claude -p <prompt> --output-format json`. The CLI prints a single
//! JSON result object carrying the final text and a `session_id` used to
//! resume the conversation on the next call.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Invocation, ParsedOutput, WorkerAdapter, WorkerError, WorkerHandle, base_command, run_cli, spawn_logged};
use crate::config::WorkerConfig;

/// Tools that let the agent modify files
const WRITE_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];

/// Adapter for the `claude` CLI
pub struct ClaudeAdapter {
    config: WorkerConfig,
}

impl ClaudeAdapter {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Full argument list for one invocation
    pub fn build_args(&self, prompt: &str, resume: Option<&str>) -> Vec<String> {
        let config = &self.config;
        let mut args = vec![
            "-p".to_string(),
            prompt.to_string(),
            "--output-format".to_string(),
            "json".to_string(),
        ];

        if let Some(model) = &config.model {
            args.extend(["--model".to_string(), model.clone()]);
        }
        if let Some(token) = resume {
            args.extend(["--resume".to_string(), token.to_string()]);
        }

        if config.bypass_safety {
            args.push("--dangerously-skip-permissions".to_string());
        } else {
            if !config.allowed_tools.is_empty() {
                args.extend(["--allowedTools".to_string(), config.allowed_tools.join(",")]);
            }
            if let Some(mode) = &config.permission_mode {
                args.extend(["--permission-mode".to_string(), mode.clone()]);
            }
        }

        for dir in &config.add_dirs {
            args.extend(["--add-dir".to_string(), dir.display().to_string()]);
        }

        if !config.config_overrides.is_empty()
            && let Ok(settings) = serde_json::to_string(&config.config_overrides)
        {
            args.extend(["--settings".to_string(), settings]);
        }

        if let Some(effort) = &config.reasoning_effort {
            debug!(worker = %config.id, %effort, "ClaudeAdapter: reasoning effort not supported by CLI, ignoring");
        }

        args.extend(config.extra_args.iter().cloned());
        args
    }

    /// Whether the agent cannot write its own output file
    ///
    /// An allow-list with no write tools, or plan mode, means the only
    /// trustworthy result is the text the CLI returns.
    fn prefers_live_text(&self) -> bool {
        if self.config.bypass_safety {
            return false;
        }
        let read_only_tools = !self.config.allowed_tools.is_empty()
            && !self.config.allowed_tools.iter().any(|tool| {
                let name = tool.split('(').next().unwrap_or(tool).trim();
                WRITE_TOOLS.contains(&name)
            });
        read_only_tools || self.config.permission_mode.as_deref() == Some("plan")
    }
}

#[derive(Debug, Deserialize)]
struct ResultMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    result: Option<String>,
    session_id: Option<String>,
}

/// Parse `--output-format json` output
///
/// Accepts a single JSON object, or a stream whose last `result` line wins.
/// Anything unparseable is returned verbatim as the text.
pub fn parse_output(stdout: &str) -> ParsedOutput {
    let trimmed = stdout.trim();
    if let Some(parsed) = parse_result(trimmed) {
        return parsed;
    }
    for line in trimmed.lines().rev() {
        if let Some(parsed) = parse_result(line.trim()) {
            return parsed;
        }
    }
    debug!(len = stdout.len(), "parse_output: no result object, using raw output");
    ParsedOutput {
        text: stdout.to_string(),
        continuation: None,
    }
}

fn parse_result(text: &str) -> Option<ParsedOutput> {
    if !text.starts_with('{') {
        return None;
    }
    let message: ResultMessage = serde_json::from_str(text).ok()?;
    if message.kind.as_deref().is_some_and(|kind| kind != "result") {
        return None;
    }
    if message.result.is_none() && message.session_id.is_none() {
        return None;
    }
    Some(ParsedOutput {
        text: message.result.unwrap_or_default(),
        continuation: message.session_id.filter(|id| !id.is_empty()),
    })
}

#[async_trait]
impl WorkerAdapter for ClaudeAdapter {
    fn display_name(&self) -> String {
        match &self.config.model {
            Some(model) => format!("claude ({})", model),
            None => "claude".to_string(),
        }
    }

    fn spawn(&self, invocation: &Invocation) -> Result<WorkerHandle, WorkerError> {
        let resume = invocation.resume_token();
        debug!(worker = %self.config.id, resume = resume.is_some(), "ClaudeAdapter::spawn: called");
        let mut cmd = base_command(&self.config, &invocation.worktree);
        cmd.args(self.build_args(&invocation.prompt, resume.as_deref()));
        spawn_logged(
            cmd,
            &invocation.log_file,
            invocation.append_log,
            invocation.log_header.as_deref(),
        )
    }

    async fn run_sync(&self, invocation: &Invocation) -> Result<String, WorkerError> {
        run_cli(self, invocation, parse_output, self.prefers_live_text()).await
    }
}
