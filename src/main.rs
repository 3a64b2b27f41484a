// src/main.rs

//! Line-oriented command host. Reads one JSON command per line on stdin and
//! writes one JSON response per line on stdout.

use chrono::Utc;
use learning_core::config::AppConfig;
use learning_core::database;
use learning_core::error::{CoreError, CoreResult};
use learning_core::feedback::{feedback_queue, FallbackGenerator, FeedbackWorker};
use learning_core::models::{AppState, AttemptSubmission, ExecutionResult, SkillNodeProgress};
use learning_core::{classifier, mistakes, pedagogy, profile, repository};
use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::sync::MutexGuard;
use std::thread;

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Command {
    SubmitAttempt(AttemptSubmission),
    Classify { result: ExecutionResult },
    GetNextExercise { user_id: i64 },
    GenerateMissions { user_id: i64, count: Option<usize> },
    GetProfile { user_id: i64 },
    RecomputeProfile { user_id: i64 },
    GetPatterns { user_id: i64 },
    ResolveMistake { mistake_id: i64, lesson: String },
    RecordSession { user_id: i64, duration_secs: i64 },
    UpsertSkillProgress { user_id: i64, node: SkillNodeProgress },
}

fn db(state: &AppState) -> MutexGuard<'_, Connection> {
    state.db.lock().unwrap_or_else(|e| e.into_inner())
}

fn dispatch(state: &AppState, command: Command, rng: &mut StdRng) -> CoreResult<Value> {
    let now = Utc::now().timestamp();
    let conn = db(state);
    let value = match command {
        Command::SubmitAttempt(submission) => serde_json::to_value(pedagogy::process_attempt(
            &conn,
            &state.locks,
            state.feedback.as_ref(),
            &submission,
            now,
        )?)?,
        Command::Classify { result } => serde_json::to_value(classifier::classify(&result))?,
        Command::GetNextExercise { user_id } => {
            serde_json::to_value(pedagogy::get_next_exercise(&conn, user_id, rng, now)?)?
        }
        Command::GenerateMissions { user_id, count } => {
            let count = count.unwrap_or(state.config.default_mission_count);
            serde_json::to_value(pedagogy::plan_missions(&conn, user_id, count, now)?)?
        }
        Command::GetProfile { user_id } => {
            serde_json::to_value(profile::get_or_create(&conn, user_id, now)?)?
        }
        Command::RecomputeProfile { user_id } => serde_json::to_value(
            pedagogy::recompute_profile(&conn, &state.locks, user_id, now)?,
        )?,
        Command::GetPatterns { user_id } => {
            serde_json::to_value(mistakes::get_patterns(&conn, user_id, now)?)?
        }
        Command::ResolveMistake { mistake_id, lesson } => {
            json!({ "resolved": mistakes::resolve(&conn, mistake_id, &lesson, now)? })
        }
        Command::RecordSession {
            user_id,
            duration_secs,
        } => {
            pedagogy::record_session(&conn, user_id, duration_secs, now)?;
            json!({ "recorded": true })
        }
        Command::UpsertSkillProgress { user_id, node } => {
            repository::upsert_skill_progress(&conn, user_id, &node)?;
            json!({ "stored": node.node_id })
        }
    };
    Ok(value)
}

fn handle_line(state: &AppState, line: &str, rng: &mut StdRng) -> Value {
    let command = match serde_json::from_str::<Command>(line) {
        Ok(c) => c,
        Err(e) => return json!({ "ok": false, "error": format!("bad command: {}", e) }),
    };
    debug!("Command: {:?}", command);
    match dispatch(state, command, rng) {
        Ok(data) => json!({ "ok": true, "data": data }),
        Err(e) => {
            error!("Command failed: {}", e);
            json!({ "ok": false, "error": e.to_string() })
        }
    }
}

fn run(config: AppConfig) -> CoreResult<()> {
    info!("Database path: {:?}", config.database_path);
    let conn = Connection::open(&config.database_path)?;
    database::init_db(&conn, config.seed_catalog)?;

    let (publisher, rx) = feedback_queue(config.feedback_queue_capacity);
    let worker = thread::spawn(move || {
        FeedbackWorker::new(rx, FallbackGenerator).run(|event, text| {
            info!("[Feedback] User {} attempt {}: {}", event.user_id, event.attempt_id, text)
        })
    });

    let state = AppState::new(conn, Box::new(publisher), config);
    let mut rng = StdRng::from_entropy();
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&state, &line, &mut rng);
        writeln!(stdout, "{}", response)?;
        stdout.flush()?;
    }

    // Dropping the state drops the publisher, which lets the worker finish.
    drop(state);
    match worker.join() {
        Ok(handled) => info!("Feedback worker delivered {} message(s)", handled),
        Err(_) => return Err(CoreError::FeedbackUnavailable("worker panicked".to_string())),
    }
    Ok(())
}

fn main() {
    let loaded = AppConfig::from_env();
    let config = loaded.as_ref().cloned().unwrap_or_default();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_filter.as_str()),
    )
    .init();

    info!("Starting learning core...");
    if let Err(e) = &loaded {
        error!("[Config] Unusable config, using defaults: {}", e);
    }
    if let Err(e) = run(config) {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
}
