//! Worker process lifecycle
//!
//! Spawns a worker command, streams stdout and stderr into its log file while
//! collecting them in memory, and waits for exit with an optional timeout.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::WorkerError;

/// Collected output of a finished process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// stdout followed by stderr
fn combine(stdout: &str, stderr: &str) -> String {
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr),
        (false, true) => stdout.to_string(),
        _ => stderr.to_string(),
    }
}

/// A running worker process
pub struct WorkerHandle {
    child: Child,
    stdout_task: JoinHandle<String>,
    stderr_task: JoinHandle<String>,
    started: Instant,
}

impl WorkerHandle {
    /// OS process id, if the process is still running
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit
    ///
    /// With a timeout, the process is killed when the timer wins and
    /// [`WorkerError::Timeout`] is returned without reading any output.
    /// A non-zero exit is [`WorkerError::Exited`] carrying stdout and stderr.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<ProcessOutput, WorkerError> {
        debug!(pid = ?self.child.id(), ?timeout, "WorkerHandle::wait: called");
        let status = match timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, self.child.wait()).await;
                match waited {
                    Ok(status) => status?,
                    Err(_) => {
                        warn!(pid = ?self.child.id(), timeout_ms = limit.as_millis() as u64, "Worker timed out, killing");
                        if let Err(e) = self.child.kill().await {
                            warn!(error = %e, "WorkerHandle::wait: kill failed");
                        }
                        self.stdout_task.abort();
                        self.stderr_task.abort();
                        return Err(WorkerError::Timeout);
                    }
                }
            }
            None => self.child.wait().await?,
        };

        let stdout = self.stdout_task.await.unwrap_or_default();
        let stderr = self.stderr_task.await.unwrap_or_default();
        let duration_ms = self.started.elapsed().as_millis() as u64;
        debug!(code = ?status.code(), duration_ms, "WorkerHandle::wait: process exited");

        if status.success() {
            Ok(ProcessOutput {
                status,
                stdout,
                stderr,
                duration_ms,
            })
        } else {
            Err(WorkerError::Exited {
                code: status.code(),
                output: combine(&stdout, &stderr),
            })
        }
    }
}

/// Spawn `command`, streaming its output into `log_file`
///
/// The log is truncated unless `append` is set, in which case `header` (if
/// any) is written first as a run separator.
pub fn spawn_logged(
    mut command: Command,
    log_file: &Path,
    append: bool,
    header: Option<&str>,
) -> Result<WorkerHandle, WorkerError> {
    let program = command.as_std().get_program().to_string_lossy().to_string();
    debug!(%program, ?log_file, append, "spawn_logged: called");

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut log = if append {
        OpenOptions::new().create(true).append(true).open(log_file)?
    } else {
        OpenOptions::new().create(true).write(true).truncate(true).open(log_file)?
    };
    if append && let Some(header) = header {
        writeln!(log, "\n{}", header)?;
    }
    let log = Arc::new(Mutex::new(File::from_std(log)));

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| WorkerError::Spawn {
        program: program.clone(),
        source,
    })?;
    debug!(%program, pid = ?child.id(), "spawn_logged: process started");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_task = tokio::spawn(pump(stdout, Arc::clone(&log)));
    let stderr_task = tokio::spawn(pump(stderr, log));

    Ok(WorkerHandle {
        child,
        stdout_task,
        stderr_task,
        started: Instant::now(),
    })
}

/// Copy a stream line by line into the log, returning everything read
async fn pump<R>(stream: Option<R>, log: Arc<Mutex<File>>) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return String::new();
    };
    let mut reader = BufReader::new(stream);
    let mut collected = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let mut file = log.lock().await;
                if let Err(e) = file.write_all(&line).await {
                    warn!(error = %e, "pump: failed to write log");
                }
                collected.extend_from_slice(&line);
            }
            Err(e) => {
                warn!(error = %e, "pump: read failed");
                break;
            }
        }
    }

    if let Err(e) = log.lock().await.flush().await {
        debug!(error = %e, "pump: flush failed");
    }
    String::from_utf8_lossy(&collected).into_owned()
}
