//! Worker invocation error types

use thiserror::Error;

/// Errors from running a worker process
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Process exited non-zero; `output` is stdout followed by stderr
    #[error("{}", display_exit(.code, .output))]
    Exited { code: Option<i32>, output: String },

    #[error("Timeout expired")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_exit(code: &Option<i32>, output: &str) -> String {
    if !output.trim().is_empty() {
        return output.to_string();
    }
    match code {
        Some(code) => format!("Process exited with code {}", code),
        None => "Process terminated by signal".to_string(),
    }
}

impl WorkerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkerError::Timeout)
    }
}
