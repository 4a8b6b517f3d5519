//! PlanCouncil CLI
//!
//! Thin command-line surface over the session store and turn orchestrator.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use plancouncil::cli::{Cli, Command};
use plancouncil::config::Config;
use plancouncil::domain::{Phase, Session, WorkerStatus};
use plancouncil::store::SessionStore;
use plancouncil::turn::TurnOrchestrator;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing here can log
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("plancouncil")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("plancouncil.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.sessions_dir {
        config.sessions_dir = dir.clone();
    }
    info!("PlanCouncil loaded config: sessions-dir={}", config.sessions_dir.display());

    let orchestrator = TurnOrchestrator::new(SessionStore::from_config(&config));

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::New { task, worktree, no_run } => cmd_new(&orchestrator, &config, &task, worktree, no_run).await,
        Command::Turn { id } => {
            let ok = orchestrator.run_turn(&id).await?;
            report_turn(&orchestrator, &id, ok)
        }
        Command::Continue { id } => {
            let ok = orchestrator.continue_session(&id).await?;
            report_turn(&orchestrator, &id, ok)
        }
        Command::Approve { id } => cmd_approve(&orchestrator, &id),
        Command::Diff { id } => cmd_diff(&orchestrator, &id),
        Command::Status { id } => cmd_status(orchestrator.store(), &id),
        Command::List => cmd_list(orchestrator.store()),
        Command::Delete { id } => {
            orchestrator.store().delete_session(&id)?;
            println!("Deleted session {}", id);
            Ok(())
        }
    }
}

/// Create a session and, unless told otherwise, run its first turn
async fn cmd_new(
    orchestrator: &TurnOrchestrator,
    config: &Config,
    task: &str,
    worktree: Option<PathBuf>,
    no_run: bool,
) -> Result<()> {
    debug!(%task, ?worktree, no_run, "cmd_new: called");
    config.validate().context("Invalid configuration")?;

    let worktree = match worktree {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let worktree = worktree
        .canonicalize()
        .with_context(|| format!("Worktree {} does not exist", worktree.display()))?;

    let store = orchestrator.store();
    let session = store.create_session(task, &worktree, config)?;
    store.ensure_session_token(&session.id)?;
    println!("Created session {}", session.id.bold());

    if no_run {
        return Ok(());
    }
    let ok = orchestrator.run_turn(&session.id).await?;
    report_turn(orchestrator, &session.id, ok)
}

fn report_turn(orchestrator: &TurnOrchestrator, id: &str, ok: bool) -> Result<()> {
    let store = orchestrator.store();
    let session = store.require_session(id)?;
    if !ok {
        println!("{} turn {} failed: no worker produced a draft", "Error:".red().bold(), session.turn());
        print_worker_errors(&session);
        return Ok(());
    }

    let artifact = store.paths(id).artifact(session.turn());
    println!("Turn {} ready for review: {}", session.turn(), artifact.display());
    print_worker_errors(&session);
    if store.has_questions(id)? {
        println!("{}", "The plan has unanswered questions; fill in each **Answer:** before approving.".yellow());
    }
    println!("Edit the plan, then run `pc continue {}` or `pc approve {}`", id, id);
    Ok(())
}

fn cmd_approve(orchestrator: &TurnOrchestrator, id: &str) -> Result<()> {
    orchestrator.approve(id)?;
    println!("{} session {}", "Approved".green().bold(), id);
    Ok(())
}

fn cmd_diff(orchestrator: &TurnOrchestrator, id: &str) -> Result<()> {
    let diff = orchestrator.get_diff(id)?;
    if diff.is_empty() {
        println!("No changes between the last two turns");
    } else {
        print!("{}", diff);
    }
    Ok(())
}

fn cmd_status(store: &SessionStore, id: &str) -> Result<()> {
    let session = store.require_session(id)?;
    println!("Session: {}", session.id.bold());
    println!("Task:    {}", session.task());
    println!("Turn:    {}", session.turn());
    println!("Phase:   {}", phase_label(session.phase()));
    println!("Updated: {}", session.state.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));

    println!("Workers:");
    for (worker_id, status) in &session.state.workers {
        let plan = session.plan_id(worker_id).unwrap_or("-");
        println!("  {:<16} {:<8} {}", worker_id, status_label(*status), plan);
    }
    print_worker_errors(&session);

    let artifact = store.paths(id).artifact(session.turn());
    if artifact.exists() {
        println!("Plan:    {}", artifact.display());
    }
    Ok(())
}

fn cmd_list(store: &SessionStore) -> Result<()> {
    let sessions = store.list_sessions()?;
    if sessions.is_empty() {
        println!("No sessions in {}", store.sessions_dir().display());
        return Ok(());
    }
    for session in sessions {
        println!(
            "{:<24} turn {:<3} {:<14} {}",
            session.id,
            session.turn(),
            phase_label(session.phase()),
            first_line(session.task())
        );
    }
    Ok(())
}

fn print_worker_errors(session: &Session) {
    for (worker_id, summary) in &session.state.worker_errors {
        println!("  {} {}: {}", "!".red(), worker_id, summary);
    }
}

fn phase_label(phase: Phase) -> String {
    let text = phase.to_string();
    match phase {
        Phase::Error => text.red().bold().to_string(),
        Phase::Approved => text.green().bold().to_string(),
        Phase::UserReview => text.cyan().to_string(),
        _ => text.yellow().to_string(),
    }
}

fn status_label(status: WorkerStatus) -> String {
    let text = status.to_string();
    match status {
        WorkerStatus::Done => text.green().to_string(),
        WorkerStatus::Error => text.red().to_string(),
        _ => text,
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
