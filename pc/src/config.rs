//! PlanCouncil configuration types and loading

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Main PlanCouncil configuration
///
/// A copy of this struct is frozen into every session's metadata when the
/// session is created, so later edits only affect new sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one subdirectory per session
    #[serde(rename = "sessions-dir")]
    pub sessions_dir: PathBuf,

    /// Global timeout applied to every worker invocation (seconds)
    #[serde(rename = "timeout-secs", skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Workers that draft and peer-review plans
    pub workers: Vec<WorkerConfig>,

    /// Worker that merges the final plans into one artifact
    pub synthesizer: WorkerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sessions_dir: default_sessions_dir(),
            timeout_secs: None,
            log_level: None,
            workers: vec![
                WorkerConfig::new("claude", WorkerFamily::Claude),
                WorkerConfig::new("codex", WorkerFamily::Codex),
            ],
            synthesizer: WorkerConfig::new("synthesizer", WorkerFamily::Claude),
        }
    }
}

fn default_sessions_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("plancouncil")
        .join("sessions")
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .plancouncil.yml
        let local_config = PathBuf::from(".plancouncil.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/plancouncil/plancouncil.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("plancouncil").join("plancouncil.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        debug!(workers = self.workers.len(), "Config::validate: called");
        if self.enabled_workers().next().is_none() {
            bail!("No enabled workers configured");
        }

        let mut seen = HashSet::new();
        for worker in &self.workers {
            if !is_path_safe(&worker.id) {
                bail!("Worker id '{}' must be non-empty and use only [A-Za-z0-9_-]", worker.id);
            }
            if !seen.insert(worker.id.as_str()) {
                bail!("Duplicate worker id '{}'", worker.id);
            }
        }

        if let Some(secs) = self.timeout_secs
            && !(secs.is_finite() && secs > 0.0)
        {
            bail!("timeout-secs must be a positive number, got {}", secs);
        }
        Ok(())
    }

    /// Enabled workers in configured order
    pub fn enabled_workers(&self) -> impl Iterator<Item = &WorkerConfig> {
        self.workers.iter().filter(|w| w.enabled)
    }

    /// Effective timeout for a worker: its own override, else the global one
    pub fn timeout_for(&self, worker: &WorkerConfig) -> Option<Duration> {
        worker
            .timeout_secs
            .or(self.timeout_secs)
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }
}

fn is_path_safe(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Which CLI agent family drives a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerFamily {
    Claude,
    Codex,
}

impl WorkerFamily {
    /// Executable name used when no `command` override is configured
    pub fn default_command(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
        }
    }
}

impl std::fmt::Display for WorkerFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.default_command())
    }
}

/// Configuration for a single worker (also used for the synthesizer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Stable worker id, unique within the config
    pub id: String,

    /// Agent family
    pub family: WorkerFamily,

    /// Model identifier passed to the CLI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Reasoning-effort hint (low, medium, high)
    #[serde(rename = "reasoning-effort", skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,

    /// Disabled workers are skipped entirely
    pub enabled: bool,

    /// Executable override (defaults to the family's CLI name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Per-worker timeout override (seconds)
    #[serde(rename = "timeout-secs", skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,

    /// Tool allow-list (claude)
    #[serde(rename = "allowed-tools", skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,

    /// Permission mode (claude)
    #[serde(rename = "permission-mode", skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,

    /// Sandbox policy (codex): read-only, workspace-write, danger-full-access
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,

    /// Approval policy (codex)
    #[serde(rename = "approval-policy", skip_serializing_if = "Option::is_none")]
    pub approval_policy: Option<String>,

    /// Extra directories the worker may read
    #[serde(rename = "add-dirs", skip_serializing_if = "Vec::is_empty")]
    pub add_dirs: Vec<PathBuf>,

    /// Arbitrary passthrough configuration
    #[serde(rename = "config-overrides", skip_serializing_if = "BTreeMap::is_empty")]
    pub config_overrides: BTreeMap<String, String>,

    /// Raw arguments appended to the command line
    #[serde(rename = "extra-args", skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,

    /// Skip every permission/sandbox check and trust the on-disk output file
    #[serde(rename = "bypass-safety")]
    pub bypass_safety: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("worker", WorkerFamily::Claude)
    }
}

impl WorkerConfig {
    /// Create a worker config with defaults for the given family
    pub fn new(id: impl Into<String>, family: WorkerFamily) -> Self {
        Self {
            id: id.into(),
            family,
            model: None,
            reasoning_effort: None,
            enabled: true,
            command: None,
            timeout_secs: None,
            allowed_tools: Vec::new(),
            permission_mode: None,
            sandbox: None,
            approval_policy: None,
            add_dirs: Vec::new(),
            config_overrides: BTreeMap::new(),
            extra_args: Vec::new(),
            bypass_safety: false,
        }
    }

    /// Executable to spawn
    pub fn program(&self) -> &str {
        self.command.as_deref().unwrap_or(self.family.default_command())
    }
}
