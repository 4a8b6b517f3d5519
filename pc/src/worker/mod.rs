//! Worker adapters
//!
//! A worker is an external agent CLI driven through one uniform contract:
//! spawn a process with a rendered prompt, stream its output to a log, wait
//! (optionally with a timeout), extract the result and a continuation token,
//! and persist the token for the next call.
//!
//! Each agent family is one [`WorkerAdapter`] implementation, selected by
//! [`create_adapter`] from the worker's configured family.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

mod claude;
mod codex;
pub mod continuation;
mod error;
pub mod process;
mod summary;

pub use claude::ClaudeAdapter;
pub use codex::CodexAdapter;
pub use error::WorkerError;
pub use process::{ProcessOutput, WorkerHandle, spawn_logged};
pub use summary::{MAX_SUMMARY_CHARS, summarize_error};

use crate::config::{WorkerConfig, WorkerFamily};

/// One worker invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Directory the process runs in
    pub worktree: PathBuf,
    /// Rendered prompt
    pub prompt: String,
    /// File the worker is asked to write its plan to
    pub output_file: PathBuf,
    /// Process log (stdout + stderr)
    pub log_file: PathBuf,
    pub timeout: Option<Duration>,
    /// Where the continuation token is read from and saved to
    pub continuation_file: Option<PathBuf>,
    /// Append to the log instead of truncating it
    pub append_log: bool,
    /// Run-separator written before appended output
    pub log_header: Option<String>,
}

impl Invocation {
    pub fn new(
        worktree: impl Into<PathBuf>,
        prompt: impl Into<String>,
        output_file: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            worktree: worktree.into(),
            prompt: prompt.into(),
            output_file: output_file.into(),
            log_file: log_file.into(),
            timeout: None,
            continuation_file: None,
            append_log: false,
            log_header: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_continuation(mut self, path: impl Into<PathBuf>) -> Self {
        self.continuation_file = Some(path.into());
        self
    }

    /// Append to the log behind a separator header
    pub fn appending(mut self, header: impl Into<String>) -> Self {
        self.append_log = true;
        self.log_header = Some(header.into());
        self
    }

    /// Previously saved continuation token, if any
    pub fn resume_token(&self) -> Option<String> {
        self.continuation_file.as_deref().and_then(continuation::load_token)
    }
}

/// Uniform interface over an agent CLI family
#[async_trait]
pub trait WorkerAdapter: Send + Sync {
    /// Name used in logs, prompts and fallback headings
    fn display_name(&self) -> String;

    /// Start the worker process and begin streaming its log
    fn spawn(&self, invocation: &Invocation) -> Result<WorkerHandle, WorkerError>;

    /// Run the worker to completion and return its authoritative result text
    async fn run_sync(&self, invocation: &Invocation) -> Result<String, WorkerError>;
}

/// Builds the adapter for a worker config; swapped for mocks in tests
pub type AdapterFactory = Arc<dyn Fn(&WorkerConfig) -> Arc<dyn WorkerAdapter> + Send + Sync>;

/// Factory selecting adapters by worker family
pub fn default_factory() -> AdapterFactory {
    Arc::new(create_adapter)
}

/// Create the adapter for a worker's family
pub fn create_adapter(config: &WorkerConfig) -> Arc<dyn WorkerAdapter> {
    debug!(worker = %config.id, family = %config.family, "create_adapter: called");
    match config.family {
        WorkerFamily::Claude => Arc::new(ClaudeAdapter::new(config.clone())),
        WorkerFamily::Codex => Arc::new(CodexAdapter::new(config.clone())),
    }
}

/// What a family's parser recovered from stdout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    /// Final message text
    pub text: String,
    /// Continuation id for the next invocation
    pub continuation: Option<String>,
}

/// Spawn, wait and post-process a CLI worker
///
/// Shared by every family: on success the continuation token is saved and
/// the authoritative result chosen between live text and the output file.
pub(crate) async fn run_cli(
    adapter: &dyn WorkerAdapter,
    invocation: &Invocation,
    parse: fn(&str) -> ParsedOutput,
    prefer_live_text: bool,
) -> Result<String, WorkerError> {
    let name = adapter.display_name();
    debug!(worker = %name, timeout = ?invocation.timeout, prefer_live_text, "run_cli: called");

    let before = OutputStamp::capture(&invocation.output_file);
    let handle = adapter.spawn(invocation)?;
    debug!(worker = %name, pid = ?handle.pid(), "run_cli: spawned");
    let output = handle.wait(invocation.timeout).await?;
    debug!(worker = %name, duration_ms = output.duration_ms, stdout_len = output.stdout.len(), "run_cli: worker finished");

    let parsed = parse(&output.stdout);
    if let (Some(token), Some(path)) = (&parsed.continuation, &invocation.continuation_file)
        && let Err(e) = continuation::save_token(path, token)
    {
        warn!(worker = %name, ?path, error = %e, "run_cli: failed to save continuation token");
    }

    Ok(select_result(parsed.text, &invocation.output_file, prefer_live_text, &before))
}

/// Modification time and contents of an output file at one point in time
///
/// Output files are reused across steps, so a non-empty file only counts as
/// this invocation's result if it differs from the stamp taken before spawn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputStamp {
    modified: Option<SystemTime>,
    content: Option<String>,
}

impl OutputStamp {
    pub fn capture(path: &Path) -> Self {
        Self {
            modified: std::fs::metadata(path).and_then(|m| m.modified()).ok(),
            content: std::fs::read_to_string(path).ok(),
        }
    }

    /// Stamp of a file that did not exist
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Choose between the worker's live text and the on-disk output file
///
/// With `prefer_live_text`, non-empty live text wins and is mirrored into the
/// output file. Otherwise the output file wins if the worker wrote it during
/// this invocation (its stamp differs from `before`) and it is non-empty.
/// An untouched file is left-over content from an earlier step: the live text
/// wins, and the old file is used only when the worker said nothing.
/// File-system errors degrade to the in-memory text.
pub fn select_result(live_text: String, output_file: &Path, prefer_live_text: bool, before: &OutputStamp) -> String {
    if prefer_live_text && !live_text.trim().is_empty() {
        debug!(?output_file, "select_result: using live text");
        mirror_to_file(&live_text, output_file);
        return live_text;
    }

    let after = OutputStamp::capture(output_file);
    let written = after != *before;
    match after.content {
        Some(content) if written && !content.trim().is_empty() => {
            debug!(?output_file, "select_result: using output file");
            content
        }
        Some(content) if !written && live_text.trim().is_empty() && !content.trim().is_empty() => {
            debug!(?output_file, "select_result: no live text, keeping untouched output file");
            content
        }
        Some(_) => {
            debug!(?output_file, written, "select_result: output file stale or empty, using live text");
            mirror_to_file(&live_text, output_file);
            live_text
        }
        None => {
            debug!(?output_file, "select_result: output file unreadable, using live text");
            mirror_to_file(&live_text, output_file);
            live_text
        }
    }
}

fn mirror_to_file(text: &str, output_file: &Path) {
    if text.trim().is_empty() {
        return;
    }
    let result = output_file
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| std::fs::write(output_file, text));
    if let Err(e) = result {
        warn!(?output_file, error = %e, "Failed to write worker result to output file");
    }
}

/// Base command for a worker: program and working directory
pub(crate) fn base_command(config: &WorkerConfig, worktree: &Path) -> Command {
    let mut cmd = Command::new(config.program());
    cmd.current_dir(worktree);
    cmd
}
