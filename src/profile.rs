// src/profile.rs

//! Per-learner cognitive profile.
//!
//! Two write paths:
//! - [`recompute`] rebuilds every field from history and replaces the stored
//!   row. It is authoritative: incremental deltas applied before it are lost.
//! - [`apply_attempt`] / [`apply_mistake`] mutate a handful of fields after a
//!   single event. They never scan history.
//!
//! Both paths write through an optimistic version check. Callers still hold
//! the per-user lock from [`crate::locks::UserLocks`] so that a recompute and
//! an incremental update for the same learner never interleave.

use crate::constants::*;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    ActivityKind, AttemptRecord, CognitiveProfile, Difficulty, MistakeType, ProfileHistory,
};
use crate::repository;
use chrono::{DateTime, Timelike};
use log::{debug, info, warn};
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};

// --- Public Interface ---

/// Loads the learner's profile, creating a default one on first access.
pub fn get_or_create(conn: &Connection, user_id: i64, now: i64) -> CoreResult<CognitiveProfile> {
    if let Some(p) = repository::get_profile(conn, user_id)? {
        return Ok(p);
    }
    let fresh = CognitiveProfile::new(user_id, now);
    if repository::insert_profile_if_absent(conn, &fresh)? == 1 {
        info!("[Profile] Created default profile for user {}", user_id);
    }
    // Another writer may have inserted first; theirs wins.
    Ok(repository::get_profile(conn, user_id)?.unwrap_or(fresh))
}

/// Incremental update for one attempt outcome.
pub fn apply_attempt(
    conn: &Connection,
    user_id: i64,
    topic_id: Option<i64>,
    passed: bool,
    now: i64,
) -> CoreResult<CognitiveProfile> {
    let updated = update_with_retry(conn, user_id, now, |p| {
        apply_attempt_to(p, topic_id, passed)
    })?;
    debug!(
        "[Profile] User {} after {}: confidence {:.1}, momentum {:.1}, streak +{}/-{}",
        user_id,
        if passed { "pass" } else { "fail" },
        updated.confidence_index,
        updated.momentum_score,
        updated.current_win_streak,
        updated.current_lose_streak
    );
    Ok(updated)
}

/// Bumps mistake counters after a mistake log is written.
pub fn apply_mistake(
    conn: &Connection,
    user_id: i64,
    mistake_type: MistakeType,
    now: i64,
) -> CoreResult<CognitiveProfile> {
    update_with_retry(conn, user_id, now, |p| {
        p.total_mistakes += 1;
        *p.mistake_type_frequency.entry(mistake_type).or_insert(0) += 1;
    })
}

/// Full recompute from history. Replaces the stored profile.
pub fn recompute(conn: &Connection, user_id: i64, now: i64) -> CoreResult<CognitiveProfile> {
    let tx = conn.unchecked_transaction()?;
    let history = load_history(&tx, user_id, now)?;
    let previous_version = repository::get_profile(&tx, user_id)?
        .map(|p| p.version)
        .unwrap_or(0);

    let mut profile = compute_profile(user_id, &history, now);
    profile.version = previous_version + 1;
    repository::replace_profile(&tx, &profile)?;
    tx.commit()?;

    info!(
        "[Profile] Recomputed user {} from {} attempts, {} mistakes: accuracy {:.2}, burnout {:.0}",
        user_id,
        history.attempts.len(),
        history.mistakes.len(),
        profile.accuracy_rate,
        profile.burnout_risk_score
    );
    Ok(profile)
}

pub fn load_history(conn: &Connection, user_id: i64, now: i64) -> CoreResult<ProfileHistory> {
    let since = now - HISTORY_WINDOW_DAYS * DAY_SECONDS;
    Ok(ProfileHistory {
        attempts: repository::get_recent_attempts(conn, user_id, RECOMPUTE_ATTEMPT_LIMIT)?,
        mistakes: repository::get_all_mistakes(conn, user_id)?,
        activity: repository::get_activity_since(conn, user_id, since)?,
        missions: repository::get_missions_since(conn, user_id, since)?,
    })
}

// --- Incremental Math ---

fn ema(old: f64, signal: f64) -> f64 {
    // old*(1-a) + signal*a, arranged so rounding never moves away from `signal`.
    (old + (signal - old) * EMA_ALPHA).clamp(SCORE_MIN, SCORE_MAX)
}

/// Applies one attempt to an in-memory profile. Constant time.
pub fn apply_attempt_to(p: &mut CognitiveProfile, topic_id: Option<i64>, passed: bool) {
    if let Some(topic) = topic_id {
        let (weak_signal, strong_signal) = if passed {
            (SCORE_MIN, SCORE_MAX)
        } else {
            (SCORE_MAX, SCORE_MIN)
        };
        let weakness = ema(p.topic_weakness(topic), weak_signal);
        let strength = ema(p.topic_strength(topic), strong_signal);
        p.topic_weakness_map.insert(topic, weakness);
        p.topic_strength_map.insert(topic, strength);
    }

    if passed {
        p.confidence_index = (p.confidence_index + CONFIDENCE_GAIN_PASS).clamp(SCORE_MIN, SCORE_MAX);
        p.momentum_score = (p.momentum_score + MOMENTUM_GAIN_PASS).clamp(SCORE_MIN, SCORE_MAX);
        p.current_win_streak += 1;
        p.current_lose_streak = 0;
        p.total_passes += 1;
    } else {
        p.confidence_index = (p.confidence_index - CONFIDENCE_LOSS_FAIL).clamp(SCORE_MIN, SCORE_MAX);
        p.momentum_score = (p.momentum_score - MOMENTUM_LOSS_FAIL).clamp(SCORE_MIN, SCORE_MAX);
        p.current_lose_streak += 1;
        p.current_win_streak = 0;
    }

    p.total_attempts += 1;
    p.accuracy_rate = p.total_passes as f64 / p.total_attempts as f64;
}

fn update_with_retry<F>(
    conn: &Connection,
    user_id: i64,
    now: i64,
    mutate: F,
) -> CoreResult<CognitiveProfile>
where
    F: Fn(&mut CognitiveProfile),
{
    for attempt in 1..=PROFILE_WRITE_RETRIES {
        let current = get_or_create(conn, user_id, now)?;
        let expected = current.version;
        let mut next = current;
        mutate(&mut next);
        next.version = expected + 1;
        next.updated_at = now;

        if repository::update_profile_if_version(conn, &next, expected)? {
            return Ok(next);
        }
        warn!(
            "[Profile] Version conflict for user {} (try {}/{}), retrying",
            user_id, attempt, PROFILE_WRITE_RETRIES
        );
    }
    Err(CoreError::StaleProfile {
        user_id,
        attempts: PROFILE_WRITE_RETRIES,
    })
}

// --- Full Recompute ---

/// Derives a profile from history alone. Pure: the same history and `now`
/// always produce the same profile (version excluded).
pub fn compute_profile(user_id: i64, history: &ProfileHistory, now: i64) -> CognitiveProfile {
    let mut p = CognitiveProfile::new(user_id, now);
    let attempts = &history.attempts;
    let window_start = now - HISTORY_WINDOW_DAYS * DAY_SECONDS;

    // Counts and rates
    p.total_attempts = attempts.len() as i64;
    p.total_passes = attempts.iter().filter(|a| a.passed).count() as i64;
    p.total_mistakes = history.mistakes.len() as i64;
    if p.total_attempts > 0 {
        p.accuracy_rate = p.total_passes as f64 / p.total_attempts as f64;
        let distinct: BTreeSet<i64> = attempts.iter().map(|a| a.exercise_id).collect();
        p.retry_rate = p.total_attempts as f64 / distinct.len() as f64;
    }

    // Solve times over successful, timed attempts
    let timed: Vec<&AttemptRecord> = attempts
        .iter()
        .filter(|a| a.passed && a.duration_ms > 0)
        .collect();
    p.avg_solve_time_secs = mean_secs(timed.iter().copied());
    for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        let bucket: Vec<&AttemptRecord> = timed
            .iter()
            .copied()
            .filter(|a| a.difficulty == difficulty)
            .collect();
        if !bucket.is_empty() {
            p.avg_solve_time_by_difficulty
                .insert(difficulty, mean_secs(bucket.into_iter()));
        }
    }

    // Streaks (attempts are most recent first)
    if let Some(latest) = attempts.first() {
        let run = attempts
            .iter()
            .take_while(|a| a.passed == latest.passed)
            .count() as i64;
        if latest.passed {
            p.current_win_streak = run;
        } else {
            p.current_lose_streak = run;
        }
    }
    p.streak_stability = streak_stability(attempts);
    p.momentum_score = momentum(attempts);

    // Topic maps
    let mut per_topic: BTreeMap<i64, (u32, u32)> = BTreeMap::new();
    for a in attempts {
        if let Some(topic) = a.topic_id {
            let entry = per_topic.entry(topic).or_insert((0, 0));
            entry.0 += 1;
            if a.passed {
                entry.1 += 1;
            }
        }
    }
    for (topic, (n, passes)) in per_topic {
        let success_rate = passes as f64 / n as f64;
        let weight = (n as f64 / TOPIC_CONFIDENCE_ATTEMPTS).min(1.0);
        let weakness = (1.0 - success_rate) * 100.0 * weight + TOPIC_NEUTRAL * (1.0 - weight);
        let strength = success_rate * 100.0 * weight + TOPIC_NEUTRAL * (1.0 - weight);
        p.topic_weakness_map.insert(topic, weakness);
        p.topic_strength_map.insert(topic, strength);
    }

    for m in &history.mistakes {
        *p.mistake_type_frequency.entry(m.mistake_type).or_insert(0) += 1;
    }

    // Activity-derived scores
    let mut active_days: BTreeSet<i64> = history
        .activity
        .iter()
        .filter(|e| e.created_at >= window_start)
        .map(|e| e.created_at.div_euclid(DAY_SECONDS))
        .collect();
    active_days.extend(
        attempts
            .iter()
            .filter(|a| a.created_at >= window_start)
            .map(|a| a.created_at.div_euclid(DAY_SECONDS)),
    );
    let active_ratio = (active_days.len() as f64 / HISTORY_WINDOW_DAYS as f64).min(1.0);
    p.consistency_score = active_ratio * 100.0;
    p.practice_streak_days = practice_streak(&active_days, now);

    let completion_rate = if history.missions.is_empty() {
        0.0
    } else {
        history
            .missions
            .iter()
            .filter(|m| m.completed_at.is_some())
            .count() as f64
            / history.missions.len() as f64
    };
    p.engagement_score = (active_ratio * 60.0 + completion_rate * 40.0).clamp(SCORE_MIN, SCORE_MAX);
    p.preferred_session_minutes = preferred_session_minutes(history);
    p.peak_performance_hour = peak_hour(attempts);
    p.learning_velocity = learning_velocity(attempts, window_start);

    if p.total_attempts > 0 {
        let raw = CONFIDENCE_DEFAULT + (p.accuracy_rate - 0.5) * 60.0
            - (p.current_lose_streak as f64 * 5.0).min(25.0)
            + (p.current_win_streak as f64 * 2.0).min(10.0);
        p.confidence_index = raw.clamp(SCORE_MIN, SCORE_MAX);
    }

    p.burnout_risk_score = burnout_risk(&p, history, now, completion_rate);
    p
}

fn mean_secs<'a>(attempts: impl Iterator<Item = &'a AttemptRecord>) -> f64 {
    let (sum, n) = attempts.fold((0.0, 0usize), |(s, n), a| {
        (s + a.duration_ms as f64 / 1000.0, n + 1)
    });
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// 100 when outcomes never flip between pass and fail, 0 when every attempt
/// flips.
fn streak_stability(attempts: &[AttemptRecord]) -> f64 {
    let window: Vec<bool> = attempts
        .iter()
        .take(STABILITY_WINDOW)
        .map(|a| a.passed)
        .collect();
    if window.len() < 2 {
        return STREAK_STABILITY_DEFAULT;
    }
    let flips = window.windows(2).filter(|w| w[0] != w[1]).count();
    100.0 * (1.0 - flips as f64 / (window.len() - 1) as f64)
}

fn accuracy_of(attempts: &[AttemptRecord]) -> Option<f64> {
    if attempts.is_empty() {
        None
    } else {
        Some(attempts.iter().filter(|a| a.passed).count() as f64 / attempts.len() as f64)
    }
}

/// Recent accuracy against the window before it.
fn momentum(attempts: &[AttemptRecord]) -> f64 {
    let recent_end = attempts.len().min(MOMENTUM_WINDOW);
    let prior_end = attempts.len().min(MOMENTUM_WINDOW * 2);
    let recent = accuracy_of(&attempts[..recent_end]);
    let prior = accuracy_of(&attempts[recent_end..prior_end]);
    let raw = match (recent, prior) {
        (None, _) => MOMENTUM_DEFAULT,
        (Some(r), None) => MOMENTUM_DEFAULT + (r - 0.5) * 40.0,
        (Some(r), Some(p)) => MOMENTUM_DEFAULT + (r - p) * 50.0,
    };
    raw.clamp(SCORE_MIN, SCORE_MAX)
}

/// Consecutive active days ending today, or yesterday if today is still empty.
fn practice_streak(active_days: &BTreeSet<i64>, now: i64) -> i64 {
    let today = now.div_euclid(DAY_SECONDS);
    let mut day = if active_days.contains(&today) {
        today
    } else if active_days.contains(&(today - 1)) {
        today - 1
    } else {
        return 0;
    };
    let mut streak = 0;
    while active_days.contains(&day) {
        streak += 1;
        day -= 1;
    }
    streak
}

fn preferred_session_minutes(history: &ProfileHistory) -> f64 {
    let mut minutes: Vec<f64> = history
        .activity
        .iter()
        .filter(|e| e.kind == ActivityKind::Session && e.duration_secs > 0)
        .map(|e| e.duration_secs as f64 / 60.0)
        .collect();
    if minutes.is_empty() {
        return PREFERRED_SESSION_DEFAULT_MINUTES;
    }
    minutes.sort_by(|a, b| a.total_cmp(b));
    let mid = minutes.len() / 2;
    if minutes.len() % 2 == 0 {
        (minutes[mid - 1] + minutes[mid]) / 2.0
    } else {
        minutes[mid]
    }
}

fn hour_of(ts: i64) -> Option<u32> {
    DateTime::from_timestamp(ts, 0).map(|d| d.hour())
}

/// UTC hour with the best pass rate among hours with enough attempts.
fn peak_hour(attempts: &[AttemptRecord]) -> Option<u32> {
    let mut by_hour: BTreeMap<u32, (usize, usize)> = BTreeMap::new();
    for a in attempts {
        if let Some(h) = hour_of(a.created_at) {
            let entry = by_hour.entry(h).or_insert((0, 0));
            entry.0 += 1;
            if a.passed {
                entry.1 += 1;
            }
        }
    }
    let mut best: Option<(u32, f64)> = None;
    for (hour, (n, passes)) in by_hour {
        if n < PEAK_HOUR_MIN_ATTEMPTS {
            continue;
        }
        let rate = passes as f64 / n as f64;
        if best.map_or(true, |(_, r)| rate > r) {
            best = Some((hour, rate));
        }
    }
    best.map(|(h, _)| h)
}

/// Newly solved exercises per week over the history window.
fn learning_velocity(attempts: &[AttemptRecord], window_start: i64) -> f64 {
    let mut first_pass: BTreeMap<i64, i64> = BTreeMap::new();
    for a in attempts.iter().filter(|a| a.passed) {
        let entry = first_pass.entry(a.exercise_id).or_insert(a.created_at);
        *entry = (*entry).min(a.created_at);
    }
    let solved = first_pass.values().filter(|ts| **ts >= window_start).count();
    solved as f64 / (HISTORY_WINDOW_DAYS as f64 / 7.0)
}

fn burnout_risk(
    p: &CognitiveProfile,
    history: &ProfileHistory,
    now: i64,
    completion_rate: f64,
) -> f64 {
    let week_start = now - TREND_WINDOW_DAYS * DAY_SECONDS;
    let week: Vec<&AttemptRecord> = history
        .attempts
        .iter()
        .filter(|a| a.created_at >= week_start)
        .collect();
    let mut risk = 0.0;

    let week_days: BTreeSet<i64> = week
        .iter()
        .map(|a| a.created_at.div_euclid(DAY_SECONDS))
        .collect();
    if !week_days.is_empty()
        && week.len() as f64 / week_days.len() as f64 > OVERLOAD_ATTEMPTS_PER_DAY
    {
        risk += BURNOUT_OVERLOAD;
    }
    if p.total_attempts > 0 && p.momentum_score < LOW_MOMENTUM_THRESHOLD {
        risk += BURNOUT_LOW_MOMENTUM;
    }
    if p.current_lose_streak >= 3 {
        risk += BURNOUT_LOSE_STREAK;
    }
    if week.len() >= 5 {
        let late = week
            .iter()
            .filter(|a| hour_of(a.created_at).map_or(false, |h| h < LATE_NIGHT_END_HOUR))
            .count();
        if late as f64 / week.len() as f64 > 0.3 {
            risk += BURNOUT_LATE_NIGHT;
        }
    }
    if history.missions.len() >= 3 && completion_rate < 0.3 {
        risk += BURNOUT_MISSION_NEGLECT;
    }
    f64::min(risk, SCORE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityEvent, ExecutionStatus};

    const NOW: i64 = 1_760_000_000;

    fn attempt(id: i64, exercise_id: i64, topic: i64, passed: bool, ago_secs: i64) -> AttemptRecord {
        AttemptRecord {
            attempt_id: id,
            user_id: 1,
            exercise_id,
            topic_id: Some(topic),
            difficulty: Difficulty::Easy,
            passed,
            status: if passed {
                ExecutionStatus::Pass
            } else {
                ExecutionStatus::Fail
            },
            duration_ms: 60_000,
            created_at: NOW - ago_secs,
        }
    }

    #[test]
    fn repeated_passes_raise_strength_and_lower_weakness_within_bounds() {
        let mut p = CognitiveProfile::new(1, NOW);
        let mut last_strength = p.topic_strength(3);
        let mut last_weakness = p.topic_weakness(3);
        for _ in 0..60 {
            apply_attempt_to(&mut p, Some(3), true);
            let s = p.topic_strength(3);
            let w = p.topic_weakness(3);
            assert!(s >= last_strength && s <= 100.0);
            assert!(w <= last_weakness && w >= 0.0);
            last_strength = s;
            last_weakness = w;
        }
        assert!(last_strength > 99.0);
        assert!(last_weakness < 1.0);
    }

    #[test]
    fn fail_resets_win_streak_and_clamps_confidence() {
        let mut p = CognitiveProfile::new(1, NOW);
        apply_attempt_to(&mut p, None, true);
        apply_attempt_to(&mut p, None, true);
        assert_eq!(p.current_win_streak, 2);
        for _ in 0..30 {
            apply_attempt_to(&mut p, None, false);
        }
        assert_eq!(p.current_win_streak, 0);
        assert_eq!(p.current_lose_streak, 30);
        assert_eq!(p.confidence_index, 0.0);
        assert!((p.accuracy_rate - 2.0 / 32.0).abs() < 1e-12);
    }

    #[test]
    fn few_attempts_stay_near_neutral() {
        let history = ProfileHistory {
            attempts: vec![attempt(1, 10, 4, false, 60)],
            ..Default::default()
        };
        let p = compute_profile(1, &history, NOW);
        let w = p.topic_weakness_map[&4];
        assert!((w - 55.0).abs() < 1e-9, "weakness {}", w);
        assert!((p.topic_strength_map[&4] - 45.0).abs() < 1e-9);
    }

    #[test]
    fn recompute_counts_rates_and_streaks() {
        let history = ProfileHistory {
            attempts: vec![
                attempt(4, 11, 1, true, 10),
                attempt(3, 11, 1, true, 20),
                attempt(2, 10, 1, false, 30),
                attempt(1, 10, 1, false, 40),
            ],
            ..Default::default()
        };
        let p = compute_profile(1, &history, NOW);
        assert_eq!(p.total_attempts, 4);
        assert_eq!(p.total_passes, 2);
        assert!((p.accuracy_rate - 0.5).abs() < 1e-12);
        assert!((p.retry_rate - 2.0).abs() < 1e-12);
        assert_eq!(p.current_win_streak, 2);
        assert_eq!(p.current_lose_streak, 0);
        assert!((p.avg_solve_time_secs - 60.0).abs() < 1e-9);
        assert_eq!(p.practice_streak_days, 1);
    }

    #[test]
    fn recompute_is_deterministic() {
        let history = ProfileHistory {
            attempts: (0..40)
                .map(|i| attempt(i, i % 7, i % 3, i % 4 != 0, i * 1800))
                .collect(),
            activity: vec![ActivityEvent {
                user_id: 1,
                kind: ActivityKind::Session,
                duration_secs: 1500,
                created_at: NOW - 100,
            }],
            ..Default::default()
        };
        let a = compute_profile(1, &history, NOW);
        let b = compute_profile(1, &history, NOW);
        assert_eq!(a, b);
        assert_eq!(a.preferred_session_minutes, 25.0);
    }

    #[test]
    fn losing_streak_and_low_momentum_raise_burnout() {
        let mut attempts: Vec<AttemptRecord> =
            (0..10).map(|i| attempt(100 + i, i, 1, false, i * 60)).collect();
        attempts.extend((10..20).map(|i| attempt(100 + i, i, 1, true, i * 60)));
        let history = ProfileHistory {
            attempts,
            ..Default::default()
        };
        let p = compute_profile(1, &history, NOW);
        assert_eq!(p.current_lose_streak, 10);
        assert!(p.momentum_score < LOW_MOMENTUM_THRESHOLD);
        assert!(p.burnout_risk_score >= BURNOUT_LOW_MOMENTUM + BURNOUT_LOSE_STREAK);
    }
}
