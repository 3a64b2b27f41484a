// src/database.rs

use crate::error::CoreResult;
use crate::models::JsonCatalog;
use log::{debug, info};
use rusqlite::{params, Connection};

pub fn init_db(conn: &Connection, seed_catalog: bool) -> CoreResult<()> {
    debug!("[DB] init_db: Checking database schema...");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL
        );
        CREATE TABLE IF NOT EXISTS topic_prereqs (
            topic_id INTEGER,
            prereq_id INTEGER,
            PRIMARY KEY (topic_id, prereq_id)
        );
        CREATE TABLE IF NOT EXISTS exercises (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            difficulty TEXT CHECK (difficulty IN ('Easy','Medium','Hard')),
            topic_id INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS attempts (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            exercise_id INTEGER NOT NULL,
            topic_id INTEGER,
            difficulty TEXT NOT NULL,
            passed INTEGER NOT NULL,
            status TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_attempts_user_time ON attempts(user_id, created_at);
        CREATE TABLE IF NOT EXISTS mistake_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            question_id INTEGER NOT NULL,
            attempt_id INTEGER NOT NULL,
            mistake_type TEXT NOT NULL,
            severity INTEGER NOT NULL,
            description TEXT NOT NULL,
            code_snippet TEXT NOT NULL,
            error_text TEXT,
            is_recurring INTEGER NOT NULL,
            topic_id INTEGER,
            skill_area TEXT,
            was_resolved INTEGER NOT NULL DEFAULT 0,
            resolved_at INTEGER,
            lesson TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_mistakes_recurrence
            ON mistake_logs(user_id, mistake_type, created_at);
        CREATE TABLE IF NOT EXISTS cognitive_profiles (
            user_id INTEGER PRIMARY KEY,
            accuracy_rate REAL NOT NULL,
            retry_rate REAL NOT NULL,
            avg_solve_time_secs REAL NOT NULL,
            avg_solve_time_by_difficulty TEXT NOT NULL,
            streak_stability REAL NOT NULL,
            momentum_score REAL NOT NULL,
            burnout_risk_score REAL NOT NULL,
            confidence_index REAL NOT NULL,
            engagement_score REAL NOT NULL,
            preferred_session_minutes REAL NOT NULL,
            peak_performance_hour INTEGER,
            consistency_score REAL NOT NULL,
            learning_velocity REAL NOT NULL,
            current_win_streak INTEGER NOT NULL,
            current_lose_streak INTEGER NOT NULL,
            practice_streak_days INTEGER NOT NULL,
            total_attempts INTEGER NOT NULL,
            total_passes INTEGER NOT NULL,
            total_mistakes INTEGER NOT NULL,
            topic_weakness_map TEXT NOT NULL,
            topic_strength_map TEXT NOT NULL,
            mistake_type_frequency TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS activity_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            duration_secs INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_activity_user_time ON activity_events(user_id, created_at);
        CREATE TABLE IF NOT EXISTS missions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            mission_type TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            target_value INTEGER NOT NULL,
            xp_reward INTEGER NOT NULL,
            difficulty INTEGER NOT NULL,
            priority INTEGER NOT NULL,
            target_topic INTEGER,
            target_skill_area TEXT,
            target_mistake_type TEXT,
            reason TEXT NOT NULL,
            scheduled_for TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            progress INTEGER NOT NULL DEFAULT 0,
            completed_at INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_missions_user_day ON missions(user_id, scheduled_for);
        CREATE TABLE IF NOT EXISTS skill_progress (
            user_id INTEGER NOT NULL,
            node_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            progress_pct REAL NOT NULL,
            completed INTEGER NOT NULL,
            PRIMARY KEY (user_id, node_id)
        );
        CREATE TABLE IF NOT EXISTS selections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            exercise_id INTEGER NOT NULL,
            score REAL NOT NULL,
            pool_size INTEGER NOT NULL,
            reason TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        ",
    )?;

    if seed_catalog {
        let count: i64 = conn.query_row("SELECT count(*) FROM exercises", [], |row| row.get(0))?;
        if count == 0 {
            info!("[DB] init_db: Catalog empty. Seeding data...");
            seed_data(conn)?;
        }
    }

    Ok(())
}

fn seed_data(conn: &Connection) -> CoreResult<()> {
    let data = include_str!("data/catalog.json");
    let catalog: JsonCatalog = serde_json::from_str(data)?;

    // 1. Topics + prereqs
    let mut t_stmt = conn.prepare("INSERT OR IGNORE INTO topics (id, name) VALUES (?, ?)")?;
    let mut p_stmt =
        conn.prepare("INSERT OR IGNORE INTO topic_prereqs (topic_id, prereq_id) VALUES (?, ?)")?;
    for t in &catalog.topics {
        t_stmt.execute(params![t.id, t.name])?;
        for prereq in &t.prereqs {
            p_stmt.execute(params![t.id, prereq])?;
        }
    }

    // 2. Exercises
    let mut e_stmt = conn.prepare(
        "INSERT OR REPLACE INTO exercises (id, title, difficulty, topic_id) VALUES (?, ?, ?, ?)",
    )?;
    for e in &catalog.exercises {
        e_stmt.execute(params![e.id, e.title, e.difficulty, e.topic_id])?;
    }

    info!(
        "[DB] Seeded {} topics and {} exercises",
        catalog.topics.len(),
        catalog.exercises.len()
    );
    Ok(())
}
