//! Workers that answer only on stdout
//!
//! Each worker's working file is reused by every step, so a worker that
//! never writes it must still have each step's reply taken as its result.

#![cfg(unix)]

mod common;

use std::path::Path;

use common::{cli_worker, write_script};
use plancouncil::config::Config;
use plancouncil::domain::{Phase, WorkerStatus};
use plancouncil::store::SessionStore;
use plancouncil::turn::TurnOrchestrator;
use tempfile::TempDir;

const REPLY_ONLY: &str = r##"case "$*" in
  *"Draft from"*) result="# @WORKER@ REVIEWED" ;;
  *) result="# @WORKER@ DRAFT" ;;
esac
printf '{"type":"result","result":"%s","session_id":"s-@WORKER@"}\n' "$result""##;

fn reply_only_worker(bin: &Path, id: &str) -> plancouncil::config::WorkerConfig {
    let script = write_script(bin, &format!("claude-{}", id), &REPLY_ONLY.replace("@WORKER@", id));
    cli_worker(id, &script)
}

fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_review_reply_replaces_draft_left_in_working_file() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let synth_prompt = temp.path().join("synth-prompt.txt");
    let synth = write_script(
        &bin,
        "claude-synth",
        &format!(
            "printf '%s' \"$*\" > '{}'\nprintf '%s\\n' '{{\"type\":\"result\",\"result\":\"# Merged\"}}'",
            synth_prompt.display()
        ),
    );

    let config = Config {
        workers: vec![reply_only_worker(&bin, "a"), reply_only_worker(&bin, "b")],
        synthesizer: cli_worker("synth", &synth),
        ..Default::default()
    };
    let store = SessionStore::new(temp.path().join("sessions"));
    let session = store.create_session("Split the monolith", temp.path(), &config).unwrap();
    let orchestrator = TurnOrchestrator::new(store);
    let paths = orchestrator.store().paths(&session.id);

    assert!(orchestrator.run_turn(&session.id).await.unwrap());

    assert_eq!(read(paths.draft(1, "a")), "# a DRAFT");
    assert_eq!(read(paths.review(1, "a")), "# a REVIEWED");
    assert_eq!(read(paths.review(1, "b")), "# b REVIEWED");

    let prompt = read(&synth_prompt);
    assert!(prompt.contains("# a REVIEWED"));
    assert!(prompt.contains("# b REVIEWED"));
    assert!(!prompt.contains("DRAFT"));
    assert_eq!(orchestrator.store().read_artifact(&session.id, 1).unwrap().as_deref(), Some("# Merged"));

    // Turn 2 drafts start from the consensus in each working file
    assert!(orchestrator.continue_session(&session.id).await.unwrap());

    let session = orchestrator.store().require_session(&session.id).unwrap();
    assert_eq!(session.phase(), Phase::UserReview);
    assert_eq!(session.worker_status("a"), Some(WorkerStatus::Done));
    assert_eq!(read(paths.draft(2, "a")), "# a DRAFT");
    assert_eq!(read(paths.draft(2, "b")), "# b DRAFT");
    assert_eq!(read(paths.review(2, "b")), "# b REVIEWED");
    assert_eq!(read(paths.working_plan(session.plan_id("a").unwrap())), "# Merged");
}
