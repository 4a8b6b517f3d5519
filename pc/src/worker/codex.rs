//! Codex CLI worker
//!
//! Runs `codex exec --json`, which emits one JSON event per line. The thread
//! id from `thread.started` resumes the conversation; the last completed
//! agent message is the final text.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Invocation, ParsedOutput, WorkerAdapter, WorkerError, WorkerHandle, base_command, run_cli, spawn_logged};
use crate::config::WorkerConfig;

/// Adapter for the `codex` CLI
pub struct CodexAdapter {
    config: WorkerConfig,
}

impl CodexAdapter {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Full argument list for one invocation
    ///
    /// `resume <id>` must come after every option and right before the prompt.
    pub fn build_args(&self, prompt: &str, resume: Option<&str>) -> Vec<String> {
        let config = &self.config;
        let mut args: Vec<String> = vec!["exec".into(), "--json".into(), "--skip-git-repo-check".into()];

        if let Some(model) = &config.model {
            args.extend(["-m".to_string(), model.clone()]);
        }
        if let Some(effort) = &config.reasoning_effort {
            args.extend(["-c".to_string(), format!("model_reasoning_effort=\"{}\"", effort)]);
        }

        if config.bypass_safety {
            args.push("--dangerously-bypass-approvals-and-sandbox".to_string());
        } else {
            if let Some(sandbox) = &config.sandbox {
                args.extend(["--sandbox".to_string(), sandbox.clone()]);
            }
            if let Some(policy) = &config.approval_policy {
                args.extend(["-c".to_string(), format!("approval_policy=\"{}\"", policy)]);
            }
        }

        for dir in &config.add_dirs {
            args.extend(["--add-dir".to_string(), dir.display().to_string()]);
        }
        for (key, value) in &config.config_overrides {
            args.extend(["-c".to_string(), format!("{}={}", key, value)]);
        }
        args.extend(config.extra_args.iter().cloned());

        if let Some(token) = resume {
            args.extend(["resume".to_string(), token.to_string()]);
        }
        args.push(prompt.to_string());
        args
    }

    fn prefers_live_text(&self) -> bool {
        !self.config.bypass_safety && self.config.sandbox.as_deref() == Some("read-only")
    }
}

/// Parse `codex exec --json` event lines
///
/// Falls back to the raw output when no agent message is found.
pub fn parse_output(stdout: &str) -> ParsedOutput {
    let mut thread_id = None;
    let mut last_message = None;

    for line in stdout.lines() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        let Ok(event) = serde_json::from_str::<Value>(line) else {
            continue;
        };

        match event.get("type").and_then(Value::as_str) {
            Some("thread.started") => {
                if let Some(id) = event.get("thread_id").and_then(Value::as_str) {
                    thread_id = Some(id.to_string());
                }
            }
            Some("item.completed") => {
                let item = &event["item"];
                let kind = item.get("type").or_else(|| item.get("item_type")).and_then(Value::as_str);
                if kind == Some("agent_message")
                    && let Some(text) = item.get("text").and_then(Value::as_str)
                {
                    last_message = Some(text.to_string());
                }
            }
            _ => {
                // Older releases wrap events in `msg`
                let msg = &event["msg"];
                match msg.get("type").and_then(Value::as_str) {
                    Some("session_configured") => {
                        if let Some(id) = msg.get("session_id").and_then(Value::as_str) {
                            thread_id = Some(id.to_string());
                        }
                    }
                    Some("agent_message") => {
                        if let Some(text) = msg.get("message").and_then(Value::as_str) {
                            last_message = Some(text.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    if last_message.is_none() {
        debug!(len = stdout.len(), "parse_output: no agent message, using raw output");
    }
    ParsedOutput {
        text: last_message.unwrap_or_else(|| stdout.to_string()),
        continuation: thread_id.filter(|id| !id.is_empty()),
    }
}

#[async_trait]
impl WorkerAdapter for CodexAdapter {
    fn display_name(&self) -> String {
        match &self.config.model {
            Some(model) => format!("codex ({})", model),
            None => "codex".to_string(),
        }
    }

    fn spawn(&self, invocation: &Invocation) -> Result<WorkerHandle, WorkerError> {
        let resume = invocation.resume_token();
        debug!(worker = %self.config.id, resume = resume.is_some(), "CodexAdapter::spawn: called");
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
