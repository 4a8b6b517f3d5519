//! Turn orchestration with scripted adapters

mod common;

use std::sync::{Arc, Mutex};

use common::{Fixture, MockAdapter, Step, config_with};
use plancouncil::domain::{Phase, WorkerStatus};
use plancouncil::store::{SessionStore, write_atomic};
use plancouncil::turn::{TurnError, unified_diff};
use plancouncil::worker::WorkerError;

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_two_workers_reach_user_review() {
    let claude = MockAdapter::echo("claude");
    let codex = MockAdapter::echo("codex");
    let synth = MockAdapter::echo("synth");
    let fx = Fixture::new(
        config_with(&["claude", "codex"]),
        vec![claude.clone(), codex.clone(), synth.clone()],
    );

    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());

    let session = fx.session();
    assert_eq!(session.phase(), Phase::UserReview);
    assert_eq!(session.turn(), 1);
    assert_eq!(session.worker_status("claude"), Some(WorkerStatus::Done));
    assert_eq!(session.worker_status("codex"), Some(WorkerStatus::Done));
    assert!(session.state.worker_errors.is_empty());

    // Each worker drafts once and reviews once; the synthesizer merges once
    assert_eq!(claude.call_count(), 2);
    assert_eq!(codex.call_count(), 2);
    assert_eq!(synth.call_count(), 1);

    // Reviews happen in a ring: each reviewer sees its neighbor's draft
    assert!(claude.prompts(Step::Review)[0].contains("# codex draft"));
    assert!(codex.prompts(Step::Review)[0].contains("# claude draft"));

    // The synthesizer sees every reviewed plan
    let synth_prompt = &synth.prompts(Step::Synthesize)[0];
    assert!(synth_prompt.contains("# claude review"));
    assert!(synth_prompt.contains("# codex review"));
    assert!(!synth_prompt.contains("Never resurrect"));

    // Artifact, snapshot and every working file hold the merged plan
    let paths = fx.store().paths(&fx.session_id);
    assert_eq!(fx.artifact(1), "# Merged plan\n");
    assert_eq!(std::fs::read_to_string(paths.snapshot(1)).unwrap(), "# Merged plan\n");
    for worker in ["claude", "codex"] {
        let plan_id = session.plan_id(worker).unwrap();
        assert_eq!(std::fs::read_to_string(paths.working_plan(plan_id)).unwrap(), "# Merged plan\n");
    }

    // Audit copies of drafts and reviews
    assert_eq!(std::fs::read_to_string(paths.draft(1, "claude")).unwrap(), "# claude draft\n");
    assert_eq!(std::fs::read_to_string(paths.review(1, "codex")).unwrap(), "# codex review\n");
}

#[tokio::test]
async fn test_three_workers_pair_as_ring() {
    let a = MockAdapter::echo("a");
    let b = MockAdapter::echo("b");
    let c = MockAdapter::echo("c");
    let fx = Fixture::new(
        config_with(&["a", "b", "c"]),
        vec![a.clone(), b.clone(), c.clone(), MockAdapter::echo("synth")],
    );

    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());

    let a_review = &a.prompts(Step::Review)[0];
    let b_review = &b.prompts(Step::Review)[0];
    let c_review = &c.prompts(Step::Review)[0];
    assert!(a_review.contains("# b draft") && !a_review.contains("# c draft"));
    assert!(b_review.contains("# c draft") && !b_review.contains("# a draft"));
    assert!(c_review.contains("# a draft") && !c_review.contains("# b draft"));
}

/// Adapter that records the phase persisted in `state.yml` when it is invoked
fn phase_recorder(name: &str, seen: Arc<Mutex<Vec<Phase>>>) -> Arc<MockAdapter> {
    let label = name.to_string();
    MockAdapter::new(name, move |step, invocation| {
        // logs/<plan>.log -> <sessions-dir>/<session-id>
        let session_dir = invocation.log_file.parent().and_then(|logs| logs.parent()).unwrap();
        let session_id = session_dir.file_name().unwrap().to_str().unwrap();
        let store = SessionStore::new(session_dir.parent().unwrap());
        let phase = store.require_session(session_id).unwrap().phase();
        seen.lock().unwrap().push(phase);
        Ok(match step {
            Step::Draft => format!("# {} draft\n", label),
            Step::Review => format!("# {} review\n", label),
            Step::Synthesize => "# Merged plan\n".to_string(),
        })
    })
}

#[tokio::test]
async fn test_persisted_phase_passes_through_every_step() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let fx = Fixture::new(
        config_with(&["claude", "codex"]),
        vec![
            phase_recorder("claude", seen.clone()),
            phase_recorder("codex", seen.clone()),
            phase_recorder("synth", seen.clone()),
        ],
    );

    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            Phase::Drafting,
            Phase::Drafting,
            Phase::PeerReview,
            Phase::PeerReview,
            Phase::Synthesizing,
        ]
    );
    assert_eq!(fx.session().phase(), Phase::UserReview);
}

// =============================================================================
// Partial and total failure
// =============================================================================

#[tokio::test]
async fn test_all_workers_fail_sets_error() {
    let synth = MockAdapter::echo("synth");
    let fx = Fixture::new(
        config_with(&["claude", "codex"]),
        vec![
            MockAdapter::failing("claude", "loading\nerror: unexpected argument '--bogus' found\n"),
            MockAdapter::failing("codex", "sh: codex: command not found\n"),
            synth.clone(),
        ],
    );

    assert!(!fx.orchestrator.run_turn(&fx.session_id).await.unwrap());

    let session = fx.session();
    assert_eq!(session.phase(), Phase::Error);
    assert_eq!(session.worker_status("claude"), Some(WorkerStatus::Error));
    assert_eq!(
        session.worker_error("claude"),
        Some("error: unexpected argument '--bogus' found")
    );
    assert_eq!(session.worker_error("codex"), Some("sh: codex: command not found"));
    assert_eq!(synth.call_count(), 0);
    assert!(fx.store().read_artifact(&fx.session_id, 1).unwrap().is_none());

    // Error is terminal
    let err = fx.orchestrator.run_turn(&fx.session_id).await.unwrap_err();
    assert!(matches!(err, TurnError::TerminalPhase { .. }));
    let err = fx.orchestrator.continue_session(&fx.session_id).await.unwrap_err();
    assert!(matches!(err, TurnError::TerminalPhase { .. }));
}

#[tokio::test]
async fn test_single_survivor_is_used_verbatim() {
    let synth = MockAdapter::echo("synth");
    let codex = MockAdapter::echo("codex");
    let fx = Fixture::new(
        config_with(&["claude", "codex"]),
        vec![MockAdapter::failing("claude", "Timeout expired"), codex.clone(), synth.clone()],
    );

    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());

    let session = fx.session();
    assert_eq!(session.phase(), Phase::UserReview);
    assert_eq!(session.worker_status("claude"), Some(WorkerStatus::Error));
    assert_eq!(session.worker_error("claude"), Some("Timeout expired"));
    assert_eq!(session.worker_status("codex"), Some(WorkerStatus::Done));

    // No peer to review and nothing to merge
    assert_eq!(codex.call_count(), 1);
    assert_eq!(synth.call_count(), 0);
    assert_eq!(fx.artifact(1), "# codex draft\n");

    // The failed worker's working file still receives the consensus
    let plan_id = session.plan_id("claude").unwrap();
    let working = fx.store().paths(&fx.session_id).working_plan(plan_id);
    assert_eq!(std::fs::read_to_string(working).unwrap(), "# codex draft\n");
}

#[tokio::test]
async fn test_review_failure_keeps_draft() {
    let codex = MockAdapter::new("codex", |step, _| match step {
        Step::Review => Err(WorkerError::Timeout),
        _ => Ok("# codex draft\n".to_string()),
    });
    let synth = MockAdapter::echo("synth");
    let fx = Fixture::new(
        config_with(&["claude", "codex"]),
        vec![MockAdapter::echo("claude"), codex, synth.clone()],
    );

    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());

    let session = fx.session();
    assert_eq!(session.phase(), Phase::UserReview);
    assert_eq!(session.worker_error("codex"), Some("Timeout expired"));
    let synth_prompt = &synth.prompts(Step::Synthesize)[0];
    assert!(synth_prompt.contains("# claude review"));
    assert!(synth_prompt.contains("# codex draft"));
}

#[tokio::test]
async fn test_synthesizer_failure_falls_back_to_concatenation() {
    let fx = Fixture::new(
        config_with(&["claude", "codex"]),
        vec![
            MockAdapter::echo("claude"),
            MockAdapter::echo("codex"),
            MockAdapter::failing("synth", "error: rate limited"),
        ],
    );

    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());

    let artifact = fx.artifact(1);
    assert!(artifact.contains("## claude\n\n# claude review"));
    assert!(artifact.contains("## codex\n\n# codex review"));
    let session = fx.session();
    assert_eq!(session.phase(), Phase::UserReview);
    assert_eq!(session.worker_error("synth"), Some("error: rate limited"));
}

// =============================================================================
// Across turns
// =============================================================================

#[tokio::test]
async fn test_plan_ids_stable_and_turn_increments() {
    let fx = Fixture::new(
        config_with(&["claude", "codex"]),
        vec![MockAdapter::echo("claude"), MockAdapter::echo("codex"), MockAdapter::echo("synth")],
    );

    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());
    let first = fx.session().state.worker_plan_ids.clone();
    assert_eq!(first.len(), 2);

    for expected_turn in 2..=3 {
        assert!(fx.orchestrator.continue_session(&fx.session_id).await.unwrap());
        let session = fx.session();
        assert_eq!(session.turn(), expected_turn);
        assert_eq!(session.state.worker_plan_ids, first);
        assert_eq!(session.phase(), Phase::UserReview);
    }
}

#[tokio::test]
async fn test_run_turn_from_user_review_requires_continue() {
    let fx = Fixture::new(config_with(&["claude"]), vec![MockAdapter::echo("claude")]);
    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());

    let err = fx.orchestrator.run_turn(&fx.session_id).await.unwrap_err();
    assert!(matches!(err, TurnError::InvalidPhase { phase: Phase::UserReview, .. }));
    assert_eq!(fx.session().turn(), 1);
}

#[tokio::test]
async fn test_human_edit_becomes_feedback_diff() {
    let claude = MockAdapter::echo("claude");
    let codex = MockAdapter::echo("codex");
    let synth = MockAdapter::echo("synth");
    let fx = Fixture::new(
        config_with(&["claude", "codex"]),
        vec![claude.clone(), codex.clone(), synth.clone()],
    );
    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());

    let original = fx.artifact(1);
    let edited = format!("{}\n- Must use sqlite\n", original);
    fx.edit_artifact(1, &edited);

    assert!(fx.orchestrator.continue_session(&fx.session_id).await.unwrap());

    let expected = unified_diff(&original, &edited, "snapshot", "edited");
    assert!(!expected.is_empty());
    let draft_prompt = &claude.prompts(Step::Draft)[1];
    assert!(draft_prompt.contains(&expected));
    assert!(draft_prompt.contains("+- Must use sqlite"));

    // The synthesizer receives the interpretation guide alongside the diff
    let synth_prompt = &synth.prompts(Step::Synthesize)[1];
    assert!(synth_prompt.contains(&expected));
    assert!(synth_prompt.contains("Never resurrect content the human deleted"));
}

#[tokio::test]
async fn test_unedited_plan_sends_full_text() {
    let claude = MockAdapter::echo("claude");
    let synth = MockAdapter::echo("synth");
    let fx = Fixture::new(
        config_with(&["claude", "codex"]),
        vec![claude.clone(), MockAdapter::echo("codex"), synth.clone()],
    );
    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());
    assert!(fx.orchestrator.continue_session(&fx.session_id).await.unwrap());

    let draft_prompt = &claude.prompts(Step::Draft)[1];
    assert!(draft_prompt.contains("made no edits"));
    assert!(draft_prompt.contains("# Merged plan"));
    assert!(!draft_prompt.contains("```diff"));
    assert!(!synth.prompts(Step::Synthesize)[1].contains("Never resurrect"));
}

#[tokio::test]
async fn test_missing_snapshot_sends_full_artifact() {
    let claude = MockAdapter::echo("claude");
    let fx = Fixture::new(config_with(&["claude"]), vec![claude.clone()]);
    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());

    std::fs::remove_file(fx.store().paths(&fx.session_id).snapshot(1)).unwrap();
    fx.edit_artifact(1, "# Hand-written plan\n");
    assert!(fx.orchestrator.continue_session(&fx.session_id).await.unwrap());

    assert!(claude.prompts(Step::Draft)[1].contains("# Hand-written plan"));
}

#[tokio::test]
async fn test_continue_restarts_interrupted_turn() {
    let claude = MockAdapter::echo("claude");
    let fx = Fixture::new(config_with(&["claude"]), vec![claude.clone()]);

    // Simulate a crash during peer review
    let mut session = fx.session();
    session.transition(Phase::Drafting).unwrap();
    session.transition(Phase::PeerReview).unwrap();
    fx.store().save_state(&mut session, true).unwrap();

    assert!(fx.orchestrator.continue_session(&fx.session_id).await.unwrap());
    let session = fx.session();
    assert_eq!(session.turn(), 1);
    assert_eq!(session.phase(), Phase::UserReview);
    assert_eq!(claude.prompts(Step::Draft).len(), 1);
}

// =============================================================================
// Diff and approval
// =============================================================================

#[tokio::test]
async fn test_get_diff_unavailable_before_second_turn() {
    let fx = Fixture::new(config_with(&["claude"]), vec![MockAdapter::echo("claude")]);

    let err = fx.orchestrator.get_diff(&fx.session_id).unwrap_err();
    assert!(err.is_diff_unavailable());

    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());
    let err = fx.orchestrator.get_diff(&fx.session_id).unwrap_err();
    assert!(err.is_diff_unavailable());
}

#[tokio::test]
async fn test_get_diff_compares_consecutive_artifacts() {
    let counter = std::sync::Mutex::new(0u32);
    let claude = MockAdapter::new("claude", move |_, _| {
        let mut n = counter.lock().unwrap();
        *n += 1;
        Ok(format!("# Plan\n\nversion {}\n", n))
    });
    let fx = Fixture::new(config_with(&["claude"]), vec![claude]);

    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());
    assert!(fx.orchestrator.continue_session(&fx.session_id).await.unwrap());

    let diff = fx.orchestrator.get_diff(&fx.session_id).unwrap();
    assert!(diff.starts_with("--- turn-001.md\n+++ turn-002.md\n"));
    assert!(diff.contains("-version 1\n"));
    assert!(diff.contains("+version 2\n"));

    // Identical artifacts give an empty diff, not "unavailable"
    let paths = fx.store().paths(&fx.session_id);
    write_atomic(&paths.artifact(2), fx.artifact(1).as_bytes()).unwrap();
    assert_eq!(fx.orchestrator.get_diff(&fx.session_id).unwrap(), "");
}

#[tokio::test]
async fn test_approve_gated_by_unanswered_questions() {
    let claude = MockAdapter::new("claude", |_, _| {
        Ok("# Plan\n\n## Questions\n\nWhich database?\n\n**Answer:**\n\n".to_string())
    });
    let fx = Fixture::new(config_with(&["claude"]), vec![claude]);

    // Nothing to approve before the first turn completes
    let err = fx.orchestrator.approve(&fx.session_id).unwrap_err();
    assert!(matches!(err, TurnError::InvalidPhase { .. }));

    assert!(fx.orchestrator.run_turn(&fx.session_id).await.unwrap());
    assert!(fx.store().has_questions(&fx.session_id).unwrap());
    let err = fx.orchestrator.approve(&fx.session_id).unwrap_err();
    assert!(matches!(err, TurnError::UnansweredQuestions(_)));

    fx.edit_artifact(1, "# Plan\n\n## Questions\n\nWhich database?\n\n**Answer:** sqlite\n\n");
    assert!(!fx.store().has_questions(&fx.session_id).unwrap());
    fx.orchestrator.approve(&fx.session_id).unwrap();
    assert_eq!(fx.session().phase(), Phase::Approved);

    let err = fx.orchestrator.continue_session(&fx.session_id).await.unwrap_err();
    assert!(matches!(err, TurnError::TerminalPhase { .. }));
}
