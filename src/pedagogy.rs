// src/pedagogy.rs

use crate::classifier;
use crate::constants::*;
use crate::error::{CoreError, CoreResult};
use crate::feedback::{FeedbackEvent, FeedbackPublisher};
use crate::locks::UserLocks;
use crate::models::{
    ActivityEvent, ActivityKind, AttemptOutcome, AttemptRecord, AttemptSubmission,
    CognitiveProfile, ExerciseCandidate, ExerciseView, Mission,
};
use crate::{missions, mistakes, profile, repository, selector};
use log::{debug, info, warn};
use rand::Rng;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|e| e.into_inner())
}

// --- Public Interface ---

/// Runs one attempt through the pipeline: attempt log, classification,
/// mistake log, incremental profile update, mission progress, feedback.
///
/// Only failure to record the attempt itself is returned as an error. Later
/// stages log a warning and the attempt still counts.
pub fn process_attempt(
    conn: &Connection,
    locks: &UserLocks,
    feedback: &dyn FeedbackPublisher,
    submission: &AttemptSubmission,
    now: i64,
) -> CoreResult<AttemptOutcome> {
    let user_id = submission.user_id;
    let lock = locks.for_user(user_id);
    let _guard = hold(&lock);
    info!(
        "Processing attempt {} for exercise {} (user {})",
        submission.attempt_id, submission.exercise_id, user_id
    );

    let classification = classifier::classify(&submission.result);

    if repository::attempt_exists(conn, submission.attempt_id)? {
        warn!(
            "Attempt {} was already processed, skipping side effects",
            submission.attempt_id
        );
        return Ok(AttemptOutcome {
            attempt_id: submission.attempt_id,
            duplicate: true,
            classification,
            mistake: None,
        });
    }

    let (topic_id, difficulty) = repository::get_exercise_meta(conn, submission.exercise_id)?
        .ok_or(CoreError::UnknownExercise(submission.exercise_id))?;
    let passed = submission.result.is_success();

    // 1. Log Attempt
    let record = AttemptRecord {
        attempt_id: submission.attempt_id,
        user_id,
        exercise_id: submission.exercise_id,
        topic_id: Some(topic_id),
        difficulty,
        passed,
        status: submission.result.status,
        duration_ms: submission.result.duration_ms,
        created_at: now,
    };
    repository::log_attempt(conn, &record)?;
    if let Err(e) = repository::log_activity(
        conn,
        &ActivityEvent {
            user_id,
            kind: ActivityKind::Attempt,
            duration_secs: (submission.result.duration_ms / 1000) as i64,
            created_at: now,
        },
    ) {
        warn!("Could not log activity for attempt {}: {}", submission.attempt_id, e);
    }

    // 2. Mistake Log
    let mistake = match mistakes::record_classified(
        conn,
        user_id,
        submission.attempt_id,
        submission.exercise_id,
        &submission.result,
        &classification,
        now,
    ) {
        Ok(m) => m,
        Err(e) => {
            warn!("Mistake log failed for attempt {}: {}", submission.attempt_id, e);
            None
        }
    };

    // 3. Profile
    if let Err(e) = profile::apply_attempt(conn, user_id, Some(topic_id), passed, now) {
        warn!(
            "Incremental profile update failed for user {}, next recompute will catch up: {}",
            user_id, e
        );
    }

    // 4. Missions
    match missions::record_progress(conn, user_id, Some(topic_id), passed, now) {
        Ok(advanced) if !advanced.is_empty() => {
            debug!("Attempt {} advanced {} mission(s)", submission.attempt_id, advanced.len())
        }
        Ok(_) => {}
        Err(e) => warn!("Mission progress failed for user {}: {}", user_id, e),
    }

    // 5. Feedback (fire and forget)
    if !passed {
        feedback.publish(FeedbackEvent {
            user_id,
            attempt_id: submission.attempt_id,
            question_id: submission.exercise_id,
            classification: classification.clone(),
        });
    }

    Ok(AttemptOutcome {
        attempt_id: submission.attempt_id,
        duplicate: false,
        classification,
        mistake,
    })
}

pub fn get_next_exercise<R: Rng>(
    conn: &Connection,
    user_id: i64,
    rng: &mut R,
    now: i64,
) -> CoreResult<Option<ExerciseView>> {
    debug!("Requesting next exercise for user {}...", user_id);
    let profile = profile::get_or_create(conn, user_id, now)?;

    // 1. Discovery (unattempted exercises in unlocked topics)
    let topic_ids = repository::get_topic_ids(conn)?;
    let prereqs = repository::get_topic_prereqs(conn)?;
    let unlocked = selector::unlocked_topics(&topic_ids, &prereqs, &profile);
    debug!("Unlocked topic IDs: {:?}", unlocked);

    let candidates = repository::find_candidate_exercises(conn, user_id, &unlocked)?;
    let recent_failed = repository::get_recently_failed_topics(
        conn,
        user_id,
        now - RECENT_FAILURE_WINDOW_SECONDS,
    )?;

    if let Some((chosen, selection)) = selector::select(&profile, &candidates, &recent_failed, rng) {
        repository::log_selection(conn, user_id, &selection, now)?;
        info!(
            "Serving Discovery: {} (ID: {}, score {:.1})",
            chosen.title, chosen.exercise_id, selection.score
        );
        return Ok(Some(view(conn, &chosen, selection.reason)?));
    }

    // 2. Review (unsolved exercise in the weakest topic)
    let unsolved = repository::find_unsolved_exercises(conn, user_id)?;
    if let Some(chosen) = weakest_unsolved(&profile, &unsolved) {
        warn!(
            "No new exercises unlocked. Entering Review Mode: {} (ID: {})",
            chosen.title, chosen.exercise_id
        );
        let reason = format!(
            "Review: unsolved, topic weakness {:.0}",
            profile.topic_weakness(chosen.topic_id)
        );
        return Ok(Some(view(conn, chosen, reason)?));
    }

    info!("No exercises available.");
    Ok(None)
}

fn weakest_unsolved<'a>(
    profile: &CognitiveProfile,
    unsolved: &'a [ExerciseCandidate],
) -> Option<&'a ExerciseCandidate> {
    let mut best: Option<&ExerciseCandidate> = None;
    for c in unsolved {
        if best.map_or(true, |b| {
            profile.topic_weakness(c.topic_id) > profile.topic_weakness(b.topic_id)
        }) {
            best = Some(c);
        }
    }
    best
}

fn view(conn: &Connection, c: &ExerciseCandidate, reason: String) -> CoreResult<ExerciseView> {
    Ok(ExerciseView {
        id: c.exercise_id,
        title: c.title.clone(),
        difficulty: c.difficulty.to_string(),
        topic_name: repository::get_topic_name(conn, c.topic_id)?,
        reason,
    })
}

/// Full recompute under the learner's lock.
pub fn recompute_profile(
    conn: &Connection,
    locks: &UserLocks,
    user_id: i64,
    now: i64,
) -> CoreResult<CognitiveProfile> {
    let lock = locks.for_user(user_id);
    let _guard = hold(&lock);
    profile::recompute(conn, user_id, now)
}

/// Generates and stores today's missions.
pub fn plan_missions(
    conn: &Connection,
    user_id: i64,
    count: usize,
    now: i64,
) -> CoreResult<Vec<Mission>> {
    let templates = missions::generate_for_user(conn, user_id, count, now)?;
    missions::materialize(conn, user_id, &templates, now)
}

/// Records a practice session reported by the host.
pub fn record_session(conn: &Connection, user_id: i64, duration_secs: i64, now: i64) -> CoreResult<()> {
    repository::log_activity(
        conn,
        &ActivityEvent {
            user_id,
            kind: ActivityKind::Session,
            duration_secs: duration_secs.max(0),
            created_at: now,
        },
    )?;
    Ok(())
}
