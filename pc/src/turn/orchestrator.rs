//! Turn orchestrator
//!
//! Drives one turn through drafting, peer review and synthesis, persisting
//! the session after every phase change so a crash leaves an inspectable,
//! restartable state.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::diff::{Feedback, unified_diff};
use super::error::TurnError;
use super::pairing::ring_pairs;
use super::synthesis::fallback_concatenation;
use crate::config::WorkerConfig;
use crate::domain::{Phase, Session, WorkerStatus};
use crate::prompts::{PlanEntry, PromptContext, PromptKind, PromptLoader};
use crate::store::{SessionPaths, SessionStore, StoreError, write_atomic};
use crate::worker::{AdapterFactory, Invocation, WorkerAdapter, WorkerError, default_factory, summarize_error};

/// A worker invocation ready to launch
struct Step {
    worker: WorkerConfig,
    adapter: Arc<dyn WorkerAdapter>,
    invocation: Invocation,
}

/// A worker's current plan text
#[derive(Debug, Clone)]
struct WorkerPlan {
    worker: WorkerConfig,
    text: String,
}

/// Drives turns for sessions in a [`SessionStore`]
///
/// Callers must not run two turns for the same session concurrently; no
/// lock is taken.
pub struct TurnOrchestrator {
    store: SessionStore,
    factory: AdapterFactory,
}

impl TurnOrchestrator {
    /// Create an orchestrator that runs the real worker CLIs
    pub fn new(store: SessionStore) -> Self {
        Self::with_factory(store, default_factory())
    }

    /// Create an orchestrator with a custom adapter factory
    pub fn with_factory(store: SessionStore, factory: AdapterFactory) -> Self {
        Self { store, factory }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run the session's current turn
    ///
    /// Returns true iff the turn reached `UserReview`, false if every worker
    /// failed to draft (the session is then in `Error`).
    pub async fn run_turn(&self, session_id: &str) -> Result<bool, TurnError> {
        debug!(%session_id, "TurnOrchestrator::run_turn: called");
        let mut session = self.store.require_session(session_id)?;
        let phase = session.phase();
        if phase.is_terminal() {
            return Err(TurnError::TerminalPhase {
                session: session.id.clone(),
                phase,
            });
        }
        if phase == Phase::UserReview {
            return Err(TurnError::InvalidPhase {
                session: session.id.clone(),
                phase,
                reason: "continue the session to start the next turn",
            });
        }

        if session.assign_plan_ids() {
            debug!(session = %session.id, "run_turn: assigned new plan ids");
        }
        self.store.save_state(&mut session, true)?;

        let turn = session.turn();
        let paths = self.store.paths(&session.id);
        let loader = PromptLoader::new(&session.meta.worktree);
        let feedback = self.feedback_for(&session)?;
        info!(session = %session.id, turn, has_feedback = feedback.is_some(), "Starting turn");

        let drafts = self.drafting(&mut session, &paths, &loader, &feedback).await?;
        if drafts.is_empty() {
            error!(session = %session.id, turn, "Every worker failed to draft; turn failed");
            session.transition(Phase::Error)?;
            self.store.save_state(&mut session, true)?;
            return Ok(false);
        }

        let finals = self.peer_review(&mut session, &paths, &loader, drafts).await?;
        let synthesized = self.synthesis(&mut session, &paths, &loader, &finals, &feedback).await?;

        write_file(&paths.artifact(turn), &synthesized)?;
        write_file(&paths.snapshot(turn), &synthesized)?;
        for worker in session.config().enabled_workers() {
            let plan_id = plan_id_for(&session, worker);
            write_file(&paths.working_plan(&plan_id), &synthesized)?;
        }

        session.transition(Phase::UserReview)?;
        self.store.save_state(&mut session, true)?;
        info!(session = %session.id, turn, "Turn complete, awaiting user review");
        Ok(true)
    }

    /// Continue a session
    ///
    /// From `UserReview` this starts the next turn. A session left mid-turn
    /// by a crash re-runs its current turn from drafting.
    pub async fn continue_session(&self, session_id: &str) -> Result<bool, TurnError> {
        debug!(%session_id, "TurnOrchestrator::continue_session: called");
        let mut session = self.store.require_session(session_id)?;
        let phase = session.phase();
        match phase {
            Phase::Approved | Phase::Error => {
                return Err(TurnError::TerminalPhase {
                    session: session.id.clone(),
                    phase,
                });
            }
            Phase::UserReview => {
                session.advance_turn()?;
                self.store.save_state(&mut session, true)?;
                info!(session = %session.id, turn = session.turn(), "Advanced to next turn");
            }
            Phase::Drafting | Phase::PeerReview | Phase::Synthesizing => {
                warn!(session = %session.id, %phase, turn = session.turn(), "Restarting interrupted turn from drafting");
            }
            Phase::Initializing => {
                debug!(session = %session.id, "continue_session: running first turn");
            }
        }
        self.run_turn(session_id).await
    }

    /// Approve the current turn's plan
    pub fn approve(&self, session_id: &str) -> Result<(), TurnError> {
        debug!(%session_id, "TurnOrchestrator::approve: called");
        let mut session = self.store.require_session(session_id)?;
        let phase = session.phase();
        if phase.is_terminal() {
            return Err(TurnError::TerminalPhase {
                session: session.id.clone(),
                phase,
            });
        }
        if phase != Phase::UserReview {
            return Err(TurnError::InvalidPhase {
                session: session.id.clone(),
                phase,
                reason: "only a plan awaiting user review can be approved",
            });
        }
        if self.store.has_questions(session_id)? {
            return Err(TurnError::UnansweredQuestions(session.id.clone()));
        }

        session.transition(Phase::Approved)?;
        self.store.save_state(&mut session, true)?;
        info!(session = %session.id, turn = session.turn(), "Plan approved");
        Ok(())
    }

    /// Unified diff of the previous turn's artifact against the current one
    pub fn get_diff(&self, session_id: &str) -> Result<String, TurnError> {
        debug!(%session_id, "TurnOrchestrator::get_diff: called");
        let session = self.store.require_session(session_id)?;
        let turn = session.turn();
        if turn < 2 {
            return Err(TurnError::DiffUnavailable {
                reason: format!("session {} is on turn {}; there is no previous turn", session.id, turn),
            });
        }

        let previous = self.store.read_artifact(session_id, turn - 1)?;
        let current = self.store.read_artifact(session_id, turn)?;
        match (previous, current) {
            (Some(previous), Some(current)) => Ok(unified_diff(
                &previous,
                &current,
                &artifact_label(turn - 1),
                &artifact_label(turn),
            )),
            (None, _) => Err(TurnError::DiffUnavailable {
                reason: format!("turn {} artifact is missing", turn - 1),
            }),
            (_, None) => Err(TurnError::DiffUnavailable {
                reason: format!("turn {} artifact has not been written yet", turn),
            }),
        }
    }

    /// Human feedback from the previous turn's edits
    fn feedback_for(&self, session: &Session) -> Result<Feedback, TurnError> {
        let turn = session.turn();
        if turn == 1 {
            return Ok(Feedback::None);
        }
        let snapshot = self.store.read_snapshot(&session.id, turn - 1)?;
        let artifact = self.store.read_artifact(&session.id, turn - 1)?;
        Ok(Feedback::from_previous_turn(snapshot.as_deref(), artifact.as_deref()))
    }

    /// Phase 1: every enabled worker drafts concurrently
    ///
    /// Returns the successful drafts in configured order.
    async fn drafting(
        &self,
        session: &mut Session,
        paths: &SessionPaths,
        loader: &PromptLoader,
        feedback: &Feedback,
    ) -> Result<Vec<WorkerPlan>, TurnError> {
        if session.phase() != Phase::Drafting {
            session.transition(Phase::Drafting)?;
        }
        let turn = session.turn();
        let workers: Vec<WorkerConfig> = session.config().enabled_workers().cloned().collect();

        // Without a feedback diff the revise prompt carries the full plan
        let current_plan = if turn > 1 && !feedback.is_some() {
            self.store.read_artifact(&session.id, turn - 1)?.unwrap_or_default()
        } else {
            String::new()
        };

        let mut steps = Vec::with_capacity(workers.len());
        for worker in workers {
            let plan_id = plan_id_for(session, &worker);
            let output = paths.working_plan(&plan_id);
            let context = if turn == 1 {
                PromptContext::draft_initial(session.task(), &output)
            } else {
                PromptContext::draft_revise(session.task(), turn, &output, feedback.text(), &current_plan)
            };
            let kind = if turn == 1 {
                PromptKind::DraftInitial
            } else {
                PromptKind::DraftRevise
            };
            let prompt = loader.render(kind, &context)?;

            let invocation = Invocation::new(&session.meta.worktree, prompt, output, paths.worker_log(&plan_id))
                .with_timeout(session.config().timeout_for(&worker))
                .with_continuation(paths.continuation(&plan_id));
            session.set_worker_status(&worker.id, WorkerStatus::Working);
            steps.push(self.step(worker, invocation));
        }
        self.store.save_state(session, true)?;
        info!(session = %session.id, turn, workers = steps.len(), "Drafting");

        let mut drafts = Vec::new();
        for (worker, result) in run_all(steps).await {
            match result {
                Ok(text) if text.trim().is_empty() => {
                    warn!(worker = %worker.id, "Worker produced an empty draft");
                    session.record_failure(&worker.id, "Worker produced no plan".to_string());
                }
                Ok(text) => {
                    debug!(worker = %worker.id, len = text.len(), "drafting: worker succeeded");
                    write_audit(&paths.draft(turn, &worker.id), &text);
                    session.record_success(&worker.id);
                    drafts.push(WorkerPlan { worker, text });
                }
                Err(e) => {
                    let summary = summarize_error(&e.to_string());
                    warn!(worker = %worker.id, timeout = e.is_timeout(), error = %summary, "Worker failed to draft");
                    session.record_failure(&worker.id, summary);
                }
            }
        }
        self.store.save_state(session, true)?;
        Ok(drafts)
    }

    /// Phase 2: each drafted worker reviews its ring successor's draft
    ///
    /// A failed review falls back to the worker's own draft.
    async fn peer_review(
        &self,
        session: &mut Session,
        paths: &SessionPaths,
        loader: &PromptLoader,
        drafts: Vec<WorkerPlan>,
    ) -> Result<Vec<WorkerPlan>, TurnError> {
        session.transition(Phase::PeerReview)?;
        let turn = session.turn();
        let header = run_header(Phase::PeerReview, turn);

        let pairs = ring_pairs(drafts.as_slice());
        if pairs.is_empty() {
            debug!(session = %session.id, "peer_review: single draft, nothing to review");
            self.store.save_state(session, true)?;
            return Ok(drafts);
        }

        let mut steps = Vec::with_capacity(pairs.len());
        for (own, peer) in pairs {
            let plan_id = plan_id_for(session, &own.worker);
            let output = paths.working_plan(&plan_id);
            let context = PromptContext::peer_review(session.task(), turn, &output, &own.text, &peer.worker.id, &peer.text);
            let prompt = loader.render(PromptKind::PeerReview, &context)?;

            let invocation = Invocation::new(&session.meta.worktree, prompt, output, paths.worker_log(&plan_id))
                .with_timeout(session.config().timeout_for(&own.worker))
                .with_continuation(paths.continuation(&plan_id))
                .appending(header.clone());
            session.set_worker_status(&own.worker.id, WorkerStatus::Working);
            steps.push(self.step(own.worker.clone(), invocation));
        }
        self.store.save_state(session, true)?;
        info!(session = %session.id, turn, reviewers = steps.len(), "Peer review");

        let results = run_all(steps).await;
        let mut finals = Vec::with_capacity(drafts.len());
        for (draft, (worker, result)) in drafts.into_iter().zip(results) {
            match result {
                Ok(text) if !text.trim().is_empty() => {
                    write_audit(&paths.review(turn, &worker.id), &text);
                    session.record_success(&worker.id);
                    finals.push(WorkerPlan { worker, text });
                }
                Ok(_) => {
                    warn!(worker = %worker.id, "Peer review returned nothing; keeping draft");
                    session.set_worker_status(&worker.id, WorkerStatus::Done);
                    finals.push(draft);
                }
                Err(e) => {
                    let summary = summarize_error(&e.to_string());
                    warn!(worker = %worker.id, error = %summary, "Peer review failed; keeping draft");
                    session.record_failure(&worker.id, summary);
                    finals.push(draft);
                }
            }
        }
        self.store.save_state(session, true)?;
        Ok(finals)
    }

    /// Phase 3: merge the final plans into one artifact
    async fn synthesis(
        &self,
        session: &mut Session,
        paths: &SessionPaths,
        loader: &PromptLoader,
        finals: &[WorkerPlan],
        feedback: &Feedback,
    ) -> Result<String, TurnError> {
        session.transition(Phase::Synthesizing)?;
        self.store.save_state(session, true)?;
        let turn = session.turn();

        if let [only] = finals {
            info!(session = %session.id, worker = %only.worker.id, "Single plan, using it verbatim");
            return Ok(only.text.clone());
        }

        let entries: Vec<PlanEntry> = finals
            .iter()
            .map(|plan| PlanEntry {
                name: plan.worker.id.clone(),
                text: plan.text.clone(),
            })
            .collect();

        let synthesizer = session.config().synthesizer.clone();
        let output = paths.artifact(turn);
        let context = PromptContext::synthesize(session.task(), turn, &output, entries.clone(), feedback.text());
        let prompt = loader.render(PromptKind::Synthesize, &context)?;
        let invocation = Invocation::new(&session.meta.worktree, prompt, output, paths.synthesizer_log())
            .with_timeout(session.config().timeout_for(&synthesizer))
            .with_continuation(paths.synthesizer_continuation())
            .appending(run_header(Phase::Synthesizing, turn));

        info!(session = %session.id, turn, plans = entries.len(), synthesizer = %synthesizer.id, "Synthesizing");
        let adapter = (self.factory)(&synthesizer);
        match adapter.run_sync(&invocation).await {
            Ok(text) if !text.trim().is_empty() => {
                session.state.worker_errors.remove(&synthesizer.id);
                Ok(text)
            }
            Ok(_) => {
                warn!(session = %session.id, "Synthesizer returned nothing; concatenating plans");
                Ok(fallback_concatenation(&entries))
            }
            Err(e) => {
                let summary = summarize_error(&e.to_string());
                warn!(session = %session.id, error = %summary, "Synthesizer failed; concatenating plans");
                session.state.worker_errors.insert(synthesizer.id.clone(), summary);
                Ok(fallback_concatenation(&entries))
            }
        }
    }

    fn step(&self, worker: WorkerConfig, invocation: Invocation) -> Step {
        let adapter = (self.factory)(&worker);
        Step {
            worker,
            adapter,
            invocation,
        }
    }
}

/// Launch every step and wait for all of them to settle
///
/// Results come back in step order regardless of completion order.
async fn run_all(steps: Vec<Step>) -> Vec<(WorkerConfig, Result<String, WorkerError>)> {
    let futures = steps.into_iter().map(|step| async move {
        let result = step.adapter.run_sync(&step.invocation).await;
        (step.worker, result)
    });
    join_all(futures).await
}

fn plan_id_for(session: &Session, worker: &WorkerConfig) -> String {
    session
        .plan_id(&worker.id)
        .map(str::to_string)
        .unwrap_or_else(|| worker.id.clone())
}

fn run_header(phase: Phase, turn: u32) -> String {
    format!("===== {} turn {} @ {} =====", phase, turn, Utc::now().to_rfc3339())
}

fn artifact_label(turn: u32) -> String {
    format!("turn-{:03}.md", turn)
}

fn write_file(path: &Path, text: &str) -> Result<(), StoreError> {
    write_atomic(path, text.as_bytes()).map_err(|e| StoreError::io(path, e))
}

/// Per-turn draft/review copies are informational; failures only warn
fn write_audit(path: &Path, text: &str) {
    if let Err(e) = write_atomic(path, text.as_bytes()) {
        warn!(?path, error = %e, "Failed to write audit copy");
    }
}
