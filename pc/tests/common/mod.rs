//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use plancouncil::config::{Config, WorkerConfig, WorkerFamily};
use plancouncil::store::SessionStore;
use plancouncil::turn::TurnOrchestrator;
use plancouncil::worker::{AdapterFactory, Invocation, WorkerAdapter, WorkerError, WorkerHandle};
use tempfile::TempDir;

/// Which step of a turn an invocation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Draft,
    Review,
    Synthesize,
}

impl Step {
    pub fn of(invocation: &Invocation) -> Self {
        match invocation.log_header.as_deref() {
            None => Step::Draft,
            Some(header) if header.contains("peer_review") => Step::Review,
            Some(_) => Step::Synthesize,
        }
    }
}

type Respond = dyn Fn(Step, &Invocation) -> Result<String, WorkerError> + Send + Sync;

/// Scripted adapter recording every call it receives
pub struct MockAdapter {
    name: String,
    respond: Box<Respond>,
    call_count: AtomicUsize,
    calls: Mutex<Vec<(Step, String)>>,
}

impl MockAdapter {
    pub fn new(
        name: &str,
        respond: impl Fn(Step, &Invocation) -> Result<String, WorkerError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            respond: Box::new(respond),
            call_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Replies with `<name> draft` / `<name> review` / `merged` per step
    pub fn echo(name: &str) -> Arc<Self> {
        let label = name.to_string();
        Self::new(name, move |step, _| {
            Ok(match step {
                Step::Draft => format!("# {} draft\n", label),
                Step::Review => format!("# {} review\n", label),
                Step::Synthesize => "# Merged plan\n".to_string(),
            })
        })
    }

    /// Fails every call with a non-zero exit
    pub fn failing(name: &str, output: &str) -> Arc<Self> {
        let output = output.to_string();
        Self::new(name, move |_, _| {
            Err(WorkerError::Exited {
                code: Some(1),
                output: output.clone(),
            })
        })
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Prompts received for a step, in call order
    pub fn prompts(&self, step: Step) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == step)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }
}

#[async_trait]
impl WorkerAdapter for MockAdapter {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn spawn(&self, _invocation: &Invocation) -> Result<WorkerHandle, WorkerError> {
        Err(WorkerError::Spawn {
            program: self.name.clone(),
            source: std::io::Error::other("mock adapters do not spawn processes"),
        })
    }

    async fn run_sync(&self, invocation: &Invocation) -> Result<String, WorkerError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let step = Step::of(invocation);
        self.calls.lock().unwrap().push((step, invocation.prompt.clone()));
        (self.respond)(step, invocation)
    }
}

/// Factory handing out pre-built mocks by worker id
pub fn factory(adapters: Vec<Arc<MockAdapter>>) -> AdapterFactory {
    let by_name: HashMap<String, Arc<MockAdapter>> = adapters.into_iter().map(|a| (a.name.clone(), a)).collect();
    Arc::new(move |config: &WorkerConfig| -> Arc<dyn WorkerAdapter> {
        match by_name.get(&config.id) {
            Some(adapter) => Arc::clone(adapter) as Arc<dyn WorkerAdapter>,
            None => MockAdapter::failing(&config.id, "error: no mock configured") as Arc<dyn WorkerAdapter>,
        }
    })
}

/// Config with the given worker ids (all claude family) and a `synth` synthesizer
pub fn config_with(worker_ids: &[&str]) -> Config {
    Config {
        workers: worker_ids.iter().map(|id| WorkerConfig::new(*id, WorkerFamily::Claude)).collect(),
        synthesizer: WorkerConfig::new("synth", WorkerFamily::Claude),
        ..Default::default()
    }
}

/// Write an executable shell script standing in for an agent CLI
#[cfg(unix)]
pub fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Claude-family worker running `script` instead of the real CLI
pub fn cli_worker(id: &str, script: &std::path::Path) -> WorkerConfig {
    let mut config = WorkerConfig::new(id, WorkerFamily::Claude);
    config.command = Some(script.display().to_string());
    config
}

/// Temp dir holding both the sessions dir and the worktree
pub struct Fixture {
    pub temp: TempDir,
    pub orchestrator: TurnOrchestrator,
    pub session_id: String,
}

impl Fixture {
    pub fn new(config: Config, adapters: Vec<Arc<MockAdapter>>) -> Self {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path().join("sessions"));
        let worktree = temp.path().join("project");
        std::fs::create_dir_all(&worktree).unwrap();
        let session = store.create_session("Add a cache layer", &worktree, &config).unwrap();
        let orchestrator = TurnOrchestrator::with_factory(store, factory(adapters));
        Self {
            temp,
            orchestrator,
            session_id: session.id,
        }
    }

    pub fn store(&self) -> &SessionStore {
        self.orchestrator.store()
    }

    pub fn session(&self) -> plancouncil::domain::Session {
        self.store().require_session(&self.session_id).unwrap()
    }

    pub fn artifact(&self, turn: u32) -> String {
        self.store().read_artifact(&self.session_id, turn).unwrap().unwrap()
    }

    pub fn edit_artifact(&self, turn: u32, text: &str) {
        let path = self.store().paths(&self.session_id).artifact(turn);
        std::fs::write(path, text).unwrap();
    }
}
