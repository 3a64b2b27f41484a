// src/repository.rs

use crate::models::{
    ActivityEvent, AttemptRecord, CognitiveProfile, Difficulty, ExecutionStatus,
    ExerciseCandidate, Mission, MissionTemplate, MistakeLog, MistakeType, Resolution, Selection,
    SkillArea, SkillNodeProgress,
};
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row, ToSql};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::str::FromStr;

// --- Column helpers ---

fn enum_col<T: FromStr<Err = String>>(row: &Row, idx: usize) -> Result<T> {
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn opt_enum_col<T: FromStr<Err = String>>(row: &Row, idx: usize) -> Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        T::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
    })
    .transpose()
}

fn json_col<T: DeserializeOwned>(row: &Row, idx: usize) -> Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn difficulty_col(row: &Row, idx: usize) -> Result<Difficulty> {
    let raw: String = row.get(idx)?;
    Ok(Difficulty::from_str(&raw).unwrap_or(Difficulty::Medium))
}

// --- Catalog ---

/// Helper to get topic and difficulty for an exercise.
pub fn get_exercise_meta(conn: &Connection, exercise_id: i64) -> Result<Option<(i64, Difficulty)>> {
    conn.query_row(
        "SELECT topic_id, difficulty FROM exercises WHERE id = ?",
        [exercise_id],
        |row| Ok((row.get(0)?, difficulty_col(row, 1)?)),
    )
    .optional()
}

pub fn get_topic_name(conn: &Connection, topic_id: i64) -> Result<String> {
    conn.query_row("SELECT name FROM topics WHERE id = ?", [topic_id], |r| {
        r.get(0)
    })
    .optional()
    .map(|name| name.unwrap_or_else(|| format!("Topic {}", topic_id)))
}

pub fn get_topic_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM topics ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Returns (topic_id, prereq_id) pairs.
pub fn get_topic_prereqs(conn: &Connection) -> Result<Vec<(i64, i64)>> {
    let mut stmt = conn.prepare("SELECT topic_id, prereq_id FROM topic_prereqs")?;
    let pairs = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<(i64, i64)>, _>>()?;
    Ok(pairs)
}

fn candidate_from_row(row: &Row) -> Result<ExerciseCandidate> {
    Ok(ExerciseCandidate {
        exercise_id: row.get(0)?,
        title: row.get(1)?,
        topic_id: row.get(2)?,
        difficulty: difficulty_col(row, 3)?,
    })
}

/// Exercises in the given topics the user has never attempted.
pub fn find_candidate_exercises(
    conn: &Connection,
    user_id: i64,
    topic_ids: &[i64],
) -> Result<Vec<ExerciseCandidate>> {
    if topic_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = topic_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT e.id, e.title, e.topic_id, e.difficulty
         FROM exercises e
         WHERE e.topic_id IN ({})
         AND e.id NOT IN (SELECT exercise_id FROM attempts WHERE user_id = ?)
         ORDER BY e.id",
        placeholders
    );

    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    for id in topic_ids {
        params.push(Box::new(*id));
    }
    params.push(Box::new(user_id));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), candidate_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    debug!("[DB] {} candidate exercises for user {}", rows.len(), user_id);
    Ok(rows)
}

/// Exercises the user attempted but never passed.
pub fn find_unsolved_exercises(conn: &Connection, user_id: i64) -> Result<Vec<ExerciseCandidate>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.title, e.topic_id, e.difficulty
         FROM exercises e
         WHERE e.id IN (SELECT exercise_id FROM attempts WHERE user_id = ?1 AND passed = 0)
         AND e.id NOT IN (SELECT exercise_id FROM attempts WHERE user_id = ?1 AND passed = 1)
         ORDER BY e.id",
    )?;
    let rows = stmt
        .query_map([user_id], candidate_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// --- Attempts ---

pub fn attempt_exists(conn: &Connection, attempt_id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM attempts WHERE id = ?",
        [attempt_id],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

/// Records a raw attempt log.
pub fn log_attempt(conn: &Connection, attempt: &AttemptRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO attempts (id, user_id, exercise_id, topic_id, difficulty, passed, status, duration_ms, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            attempt.attempt_id,
            attempt.user_id,
            attempt.exercise_id,
            attempt.topic_id,
            attempt.difficulty.as_str(),
            attempt.passed,
            attempt.status.as_str(),
            attempt.duration_ms as i64,
            attempt.created_at
        ],
    )?;
    Ok(())
}

/// Most recent first.
pub fn get_recent_attempts(conn: &Connection, user_id: i64, limit: i64) -> Result<Vec<AttemptRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, exercise_id, topic_id, difficulty, passed, status, duration_ms, created_at
         FROM attempts
         WHERE user_id = ?
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
    )?;
    let rows = stmt
        .query_map(params![user_id, limit], |row| {
            Ok(AttemptRecord {
                attempt_id: row.get(0)?,
                user_id: row.get(1)?,
                exercise_id: row.get(2)?,
                topic_id: row.get(3)?,
                difficulty: difficulty_col(row, 4)?,
                passed: row.get(5)?,
                status: enum_col::<ExecutionStatus>(row, 6)?,
                duration_ms: row.get::<_, i64>(7)?.max(0) as u64,
                created_at: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_recently_failed_topics(conn: &Connection, user_id: i64, since: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT topic_id FROM attempts
         WHERE user_id = ? AND passed = 0 AND created_at >= ? AND topic_id IS NOT NULL",
    )?;
    let topics = stmt
        .query_map(params![user_id, since], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(topics)
}

// --- Mistake Logs ---

const MISTAKE_COLUMNS: &str = "id, user_id, question_id, attempt_id, mistake_type, severity, description,
     code_snippet, error_text, is_recurring, topic_id, skill_area, was_resolved, resolved_at,
     lesson, created_at";

fn mistake_from_row(row: &Row) -> Result<MistakeLog> {
    let was_resolved: bool = row.get(12)?;
    let resolution = if was_resolved {
        Resolution::Resolved {
            resolved_at: row.get::<_, Option<i64>>(13)?.unwrap_or_default(),
            lesson: row.get::<_, Option<String>>(14)?.unwrap_or_default(),
        }
    } else {
        Resolution::Unresolved
    };
    Ok(MistakeLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        question_id: row.get(2)?,
        attempt_id: row.get(3)?,
        mistake_type: enum_col(row, 4)?,
        severity: row.get(5)?,
        description: row.get(6)?,
        code_snippet: row.get(7)?,
        error_text: row.get(8)?,
        is_recurring: row.get(9)?,
        topic_id: row.get(10)?,
        skill_area: opt_enum_col(row, 11)?,
        resolution,
        created_at: row.get(15)?,
    })
}

/// Prior mistakes of one type in one skill area (NULL area matches NULL).
pub fn count_matching_mistakes(
    conn: &Connection,
    user_id: i64,
    mistake_type: MistakeType,
    skill_area: Option<SkillArea>,
    since: i64,
) -> Result<i64> {
    conn.query_row(
        "SELECT count(*) FROM mistake_logs
         WHERE user_id = ? AND mistake_type = ? AND skill_area IS ? AND created_at >= ?",
        params![
            user_id,
            mistake_type.as_str(),
            skill_area.map(|a| a.as_str()),
            since
        ],
        |r| r.get(0),
    )
}

pub fn insert_mistake(conn: &Connection, m: &MistakeLog) -> Result<i64> {
    conn.execute(
        "INSERT INTO mistake_logs (user_id, question_id, attempt_id, mistake_type, severity, description,
            code_snippet, error_text, is_recurring, topic_id, skill_area, was_resolved, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
        params![
            m.user_id,
            m.question_id,
            m.attempt_id,
            m.mistake_type.as_str(),
            m.severity,
            m.description,
            m.code_snippet,
            m.error_text,
            m.is_recurring,
            m.topic_id,
            m.skill_area.map(|a| a.as_str()),
            m.created_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_mistake(conn: &Connection, mistake_id: i64) -> Result<Option<MistakeLog>> {
    let sql = format!("SELECT {} FROM mistake_logs WHERE id = ?", MISTAKE_COLUMNS);
    conn.query_row(&sql, [mistake_id], mistake_from_row).optional()
}

/// Marks a mistake resolved. Already-resolved rows are left untouched.
pub fn resolve_mistake(conn: &Connection, mistake_id: i64, resolved_at: i64, lesson: &str) -> Result<usize> {
    conn.execute(
        "UPDATE mistake_logs SET was_resolved = 1, resolved_at = ?, lesson = ?
         WHERE id = ? AND was_resolved = 0",
        params![resolved_at, lesson, mistake_id],
    )
}

pub fn get_all_mistakes(conn: &Connection, user_id: i64) -> Result<Vec<MistakeLog>> {
    let sql = format!(
        "SELECT {} FROM mistake_logs WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        MISTAKE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], mistake_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_recent_recurring(conn: &Connection, user_id: i64, limit: usize) -> Result<Vec<MistakeLog>> {
    let sql = format!(
        "SELECT {} FROM mistake_logs WHERE user_id = ? AND is_recurring = 1
         ORDER BY created_at DESC, id DESC LIMIT ?",
        MISTAKE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, limit as i64], mistake_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_mistakes_by_type(conn: &Connection, user_id: i64) -> Result<Vec<(MistakeType, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT mistake_type, count(*) FROM mistake_logs WHERE user_id = ? GROUP BY mistake_type",
    )?;
    let rows = stmt
        .query_map([user_id], |row| Ok((enum_col(row, 0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_mistakes_by_area(
    conn: &Connection,
    user_id: i64,
) -> Result<Vec<(Option<SkillArea>, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT skill_area, count(*) FROM mistake_logs WHERE user_id = ? GROUP BY skill_area",
    )?;
    let rows = stmt
        .query_map([user_id], |row| Ok((opt_enum_col(row, 0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Mistakes created in `[from, to)`.
pub fn count_mistakes_between(conn: &Connection, user_id: i64, from: i64, to: i64) -> Result<i64> {
    conn.query_row(
        "SELECT count(*) FROM mistake_logs WHERE user_id = ? AND created_at >= ? AND created_at < ?",
        params![user_id, from, to],
        |r| r.get(0),
    )
}

pub fn count_recurring_by_type(
    conn: &Connection,
    user_id: i64,
    since: i64,
) -> Result<Vec<(MistakeType, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT mistake_type, count(*) FROM mistake_logs
         WHERE user_id = ? AND is_recurring = 1 AND was_resolved = 0 AND created_at >= ?
         GROUP BY mistake_type",
    )?;
    let rows = stmt
        .query_map(params![user_id, since], |row| Ok((enum_col(row, 0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// --- Cognitive Profiles ---

const PROFILE_COLUMNS: &str = "user_id, accuracy_rate, retry_rate, avg_solve_time_secs,
     avg_solve_time_by_difficulty, streak_stability, momentum_score, burnout_risk_score,
     confidence_index, engagement_score, preferred_session_minutes, peak_performance_hour,
     consistency_score, learning_velocity, current_win_streak, current_lose_streak,
     practice_streak_days, total_attempts, total_passes, total_mistakes, topic_weakness_map,
     topic_strength_map, mistake_type_frequency, version, updated_at";

const PROFILE_VALUES: &str = ":user_id, :accuracy_rate, :retry_rate, :avg_solve_time_secs,
     :avg_solve_time_by_difficulty, :streak_stability, :momentum_score, :burnout_risk_score,
     :confidence_index, :engagement_score, :preferred_session_minutes, :peak_performance_hour,
     :consistency_score, :learning_velocity, :current_win_streak, :current_lose_streak,
     :practice_streak_days, :total_attempts, :total_passes, :total_mistakes, :topic_weakness_map,
     :topic_strength_map, :mistake_type_frequency, :version, :updated_at";

struct ProfileJson {
    solve_times: String,
    weakness: String,
    strength: String,
    mistakes: String,
}

impl ProfileJson {
    fn encode(p: &CognitiveProfile) -> Result<Self> {
        Ok(ProfileJson {
            solve_times: to_json(&p.avg_solve_time_by_difficulty)?,
            weakness: to_json(&p.topic_weakness_map)?,
            strength: to_json(&p.topic_strength_map)?,
            mistakes: to_json(&p.mistake_type_frequency)?,
        })
    }
}

fn profile_params<'a>(p: &'a CognitiveProfile, json: &'a ProfileJson) -> Vec<(&'static str, &'a dyn ToSql)> {
    vec![
        (":user_id", &p.user_id),
        (":accuracy_rate", &p.accuracy_rate),
        (":retry_rate", &p.retry_rate),
        (":avg_solve_time_secs", &p.avg_solve_time_secs),
        (":avg_solve_time_by_difficulty", &json.solve_times),
        (":streak_stability", &p.streak_stability),
        (":momentum_score", &p.momentum_score),
        (":burnout_risk_score", &p.burnout_risk_score),
        (":confidence_index", &p.confidence_index),
        (":engagement_score", &p.engagement_score),
        (":preferred_session_minutes", &p.preferred_session_minutes),
        (":peak_performance_hour", &p.peak_performance_hour),
        (":consistency_score", &p.consistency_score),
        (":learning_velocity", &p.learning_velocity),
        (":current_win_streak", &p.current_win_streak),
        (":current_lose_streak", &p.current_lose_streak),
        (":practice_streak_days", &p.practice_streak_days),
        (":total_attempts", &p.total_attempts),
        (":total_passes", &p.total_passes),
        (":total_mistakes", &p.total_mistakes),
        (":topic_weakness_map", &json.weakness),
        (":topic_strength_map", &json.strength),
        (":mistake_type_frequency", &json.mistakes),
        (":version", &p.version),
        (":updated_at", &p.updated_at),
    ]
}

fn profile_from_row(row: &Row) -> Result<CognitiveProfile> {
    Ok(CognitiveProfile {
        user_id: row.get(0)?,
        accuracy_rate: row.get(1)?,
        retry_rate: row.get(2)?,
        avg_solve_time_secs: row.get(3)?,
        avg_solve_time_by_difficulty: json_col(row, 4)?,
        streak_stability: row.get(5)?,
        momentum_score: row.get(6)?,
        burnout_risk_score: row.get(7)?,
        confidence_index: row.get(8)?,
        engagement_score: row.get(9)?,
        preferred_session_minutes: row.get(10)?,
        peak_performance_hour: row.get(11)?,
        consistency_score: row.get(12)?,
        learning_velocity: row.get(13)?,
        current_win_streak: row.get(14)?,
        current_lose_streak: row.get(15)?,
        practice_streak_days: row.get(16)?,
        total_attempts: row.get(17)?,
        total_passes: row.get(18)?,
        total_mistakes: row.get(19)?,
        topic_weakness_map: json_col(row, 20)?,
        topic_strength_map: json_col(row, 21)?,
        mistake_type_frequency: json_col(row, 22)?,
        version: row.get(23)?,
        updated_at: row.get(24)?,
    })
}

pub fn get_profile(conn: &Connection, user_id: i64) -> Result<Option<CognitiveProfile>> {
    let sql = format!("SELECT {} FROM cognitive_profiles WHERE user_id = ?", PROFILE_COLUMNS);
    conn.query_row(&sql, [user_id], profile_from_row).optional()
}

/// Inserts a profile unless one already exists for the user.
pub fn insert_profile_if_absent(conn: &Connection, profile: &CognitiveProfile) -> Result<usize> {
    let json = ProfileJson::encode(profile)?;
    let sql = format!(
        "INSERT OR IGNORE INTO cognitive_profiles ({}) VALUES ({})",
        PROFILE_COLUMNS, PROFILE_VALUES
    );
    let params = profile_params(profile, &json);
    conn.execute(&sql, params.as_slice())
}

/// Overwrites the stored profile unconditionally.
pub fn replace_profile(conn: &Connection, profile: &CognitiveProfile) -> Result<()> {
    let json = ProfileJson::encode(profile)?;
    let sql = format!(
        "INSERT OR REPLACE INTO cognitive_profiles ({}) VALUES ({})",
        PROFILE_COLUMNS, PROFILE_VALUES
    );
    let params = profile_params(profile, &json);
    conn.execute(&sql, params.as_slice())?;
    Ok(())
}

/// Writes `profile` only if the stored version still equals
/// `expected_version`. Returns false when another writer got there first.
pub fn update_profile_if_version(
    conn: &Connection,
    profile: &CognitiveProfile,
    expected_version: i64,
) -> Result<bool> {
    let json = ProfileJson::encode(profile)?;
    let assignments = PROFILE_COLUMNS
        .split(',')
        .map(str::trim)
        .filter(|c| *c != "user_id")
        .map(|c| format!("{} = :{}", c, c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE cognitive_profiles SET {} WHERE user_id = :user_id AND version = :expected_version",
        assignments
    );
    let mut params = profile_params(profile, &json);
    params.push((":expected_version", &expected_version));
    let changed = conn.execute(&sql, params.as_slice())?;
    Ok(changed == 1)
}

// --- Activity ---

pub fn log_activity(conn: &Connection, event: &ActivityEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO activity_events (user_id, kind, duration_secs, created_at) VALUES (?, ?, ?, ?)",
        params![
            event.user_id,
            event.kind.as_str(),
            event.duration_secs,
            event.created_at
        ],
    )?;
    Ok(())
}

pub fn get_activity_since(conn: &Connection, user_id: i64, since: i64) -> Result<Vec<ActivityEvent>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, kind, duration_secs, created_at FROM activity_events
         WHERE user_id = ? AND created_at >= ?
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id, since], |row| {
            Ok(ActivityEvent {
                user_id: row.get(0)?,
                kind: enum_col(row, 1)?,
                duration_secs: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// --- Missions ---

const MISSION_COLUMNS: &str = "id, user_id, mission_type, title, description, target_value, xp_reward,
     difficulty, priority, target_topic, target_skill_area, target_mistake_type, reason,
     scheduled_for, expires_at, progress, completed_at, is_active";

fn mission_from_row(row: &Row) -> Result<Mission> {
    Ok(Mission {
        id: row.get(0)?,
        user_id: row.get(1)?,
        template: MissionTemplate {
            mission_type: enum_col(row, 2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            target_value: row.get(5)?,
            xp_reward: row.get(6)?,
            difficulty: row.get(7)?,
            priority: row.get(8)?,
            target_topic: row.get(9)?,
            target_skill_area: opt_enum_col(row, 10)?,
            target_mistake_type: opt_enum_col(row, 11)?,
            reason: row.get(12)?,
        },
        scheduled_for: row.get(13)?,
        expires_at: row.get(14)?,
        progress: row.get(15)?,
        completed_at: row.get(16)?,
        is_active: row.get(17)?,
    })
}

pub fn deactivate_missions_for_day(conn: &Connection, user_id: i64, day: &str) -> Result<usize> {
    conn.execute(
        "UPDATE missions SET is_active = 0 WHERE user_id = ? AND scheduled_for = ? AND is_active = 1",
        params![user_id, day],
    )
}

pub fn insert_mission(
    conn: &Connection,
    user_id: i64,
    template: &MissionTemplate,
    day: &str,
    expires_at: i64,
    created_at: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO missions (user_id, mission_type, title, description, target_value, xp_reward,
            difficulty, priority, target_topic, target_skill_area, target_mistake_type, reason,
            scheduled_for, expires_at, progress, completed_at, is_active, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, 1, ?)",
        params![
            user_id,
            template.mission_type.as_str(),
            template.title,
            template.description,
            template.target_value,
            template.xp_reward,
            template.difficulty,
            template.priority,
            template.target_topic,
            template.target_skill_area.map(|a| a.as_str()),
            template.target_mistake_type.map(|t| t.as_str()),
            template.reason,
            day,
            expires_at,
            created_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_active_missions(conn: &Connection, user_id: i64, day: &str) -> Result<Vec<Mission>> {
    let sql = format!(
        "SELECT {} FROM missions WHERE user_id = ? AND scheduled_for = ? AND is_active = 1
         ORDER BY priority DESC, id ASC",
        MISSION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, day], mission_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every mission for a day, inactive ones included.
pub fn get_missions_for_day(conn: &Connection, user_id: i64, day: &str) -> Result<Vec<Mission>> {
    let sql = format!(
        "SELECT {} FROM missions WHERE user_id = ? AND scheduled_for = ? ORDER BY id ASC",
        MISSION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, day], mission_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_missions_since(conn: &Connection, user_id: i64, since: i64) -> Result<Vec<Mission>> {
    let sql = format!(
        "SELECT {} FROM missions WHERE user_id = ? AND created_at >= ? ORDER BY id ASC",
        MISSION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, since], mission_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_mission_progress(
    conn: &Connection,
    mission_id: i64,
    progress: u32,
    completed_at: Option<i64>,
) -> Result<()> {
    conn.execute(
        "UPDATE missions SET progress = ?, completed_at = COALESCE(completed_at, ?) WHERE id = ?",
        params![progress, completed_at, mission_id],
    )?;
    Ok(())
}

// --- Skill Tree Snapshot ---

pub fn upsert_skill_progress(conn: &Connection, user_id: i64, node: &SkillNodeProgress) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO skill_progress (user_id, node_id, name, progress_pct, completed)
         VALUES (?, ?, ?, ?, ?)",
        params![user_id, node.node_id, node.name, node.progress_pct, node.completed],
    )?;
    Ok(())
}

pub fn get_skill_progress(conn: &Connection, user_id: i64) -> Result<Vec<SkillNodeProgress>> {
    let mut stmt = conn.prepare(
        "SELECT node_id, name, progress_pct, completed FROM skill_progress
         WHERE user_id = ? ORDER BY node_id",
    )?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(SkillNodeProgress {
                node_id: row.get(0)?,
                name: row.get(1)?,
                progress_pct: row.get(2)?,
                completed: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// --- Selections ---

pub fn log_selection(conn: &Connection, user_id: i64, selection: &Selection, created_at: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO selections (user_id, exercise_id, score, pool_size, reason, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            user_id,
            selection.exercise_id,
            selection.score,
            selection.pool_size as i64,
            selection.reason,
            created_at
        ],
    )?;
    Ok(())
}
