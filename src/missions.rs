// src/missions.rs

//! Daily mission planning.
//!
//! [`generate`] is pure over a [`MissionSnapshot`]. The database-facing
//! functions build that snapshot, persist the chosen templates for the current
//! UTC day and advance progress as attempts come in.

use crate::constants::*;
use crate::error::CoreResult;
use crate::models::{
    CognitiveProfile, Mission, MissionSnapshot, MissionTemplate, MissionType, SkillNodeProgress,
};
use crate::{mistakes, profile, repository};
use chrono::DateTime;
use log::{debug, info};
use rusqlite::Connection;

/// Which mission-worthy conditions hold for a learner right now.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserState {
    pub burnout: bool,
    pub streak_at_risk: bool,
    pub recurring_mistakes: bool,
    pub weak_topic: bool,
    pub low_confidence: bool,
    pub low_momentum: bool,
    pub skill_unlock: bool,
    pub low_consistency: bool,
}

impl UserState {
    pub fn from_snapshot(s: &MissionSnapshot) -> Self {
        let p = &s.profile;
        UserState {
            burnout: p.burnout_risk_score > BURNOUT_THRESHOLD,
            streak_at_risk: p.current_lose_streak > 0 && p.practice_streak_days > 0,
            recurring_mistakes: s.recurring_by_type.iter().any(|(_, n)| *n > 0),
            weak_topic: p.topic_weakness_map.values().any(|w| *w > WEAKNESS_THRESHOLD),
            low_confidence: p.confidence_index < LOW_CONFIDENCE_THRESHOLD,
            low_momentum: p.momentum_score < LOW_MOMENTUM_THRESHOLD,
            skill_unlock: s.skill_nodes.iter().any(|n| !n.completed),
            low_consistency: p.consistency_score < LOW_CONSISTENCY_THRESHOLD
                && p.total_attempts >= CONSISTENCY_MIN_ATTEMPTS,
        }
    }
}

fn template(
    mission_type: MissionType,
    title: String,
    description: String,
    target_value: u32,
    xp_reward: u32,
    difficulty: u8,
    priority: u32,
    reason: String,
) -> MissionTemplate {
    MissionTemplate {
        mission_type,
        title,
        description,
        target_value,
        xp_reward,
        difficulty,
        priority,
        target_topic: None,
        target_skill_area: None,
        target_mistake_type: None,
        reason,
    }
}

pub fn streak_xp(practice_streak_days: i64) -> u32 {
    let days = practice_streak_days.clamp(0, i64::from(u32::MAX)) as u32;
    STREAK_XP_BASE
        .saturating_add(STREAK_XP_PER_DAY.saturating_mul(days))
        .min(STREAK_XP_CAP)
}

/// Weakest topic, lowest id first among equals.
fn weakest_topic(p: &CognitiveProfile) -> Option<(i64, f64)> {
    let mut best: Option<(i64, f64)> = None;
    for (topic, weakness) in &p.topic_weakness_map {
        if *weakness > WEAKNESS_THRESHOLD && best.map_or(true, |(_, w)| *weakness > w) {
            best = Some((*topic, *weakness));
        }
    }
    best
}

/// Most-progressed incomplete node, lowest id first among equals.
fn next_skill_node(nodes: &[SkillNodeProgress]) -> Option<&SkillNodeProgress> {
    let mut best: Option<&SkillNodeProgress> = None;
    for node in nodes.iter().filter(|n| !n.completed) {
        if best.map_or(true, |b| node.progress_pct > b.progress_pct) {
            best = Some(node);
        }
    }
    best
}

fn condition_missions(s: &MissionSnapshot, state: &UserState) -> Vec<MissionTemplate> {
    let p = &s.profile;
    let mut out = Vec::new();

    if state.burnout {
        out.push(template(
            MissionType::BurnoutPrevention,
            "Easy does it".to_string(),
            "Solve one exercise you are comfortable with, then take a break.".to_string(),
            1,
            20,
            1,
            PRIORITY_BURNOUT_PREVENTION,
            format!("burnout risk {:.0} above {:.0}", p.burnout_risk_score, BURNOUT_THRESHOLD),
        ));
    }

    if state.streak_at_risk {
        out.push(template(
            MissionType::StreakProtection,
            format!("Protect your {}-day streak", p.practice_streak_days),
            "Get one passing solution in today to keep the streak alive.".to_string(),
            1,
            streak_xp(p.practice_streak_days),
            1,
            PRIORITY_STREAK_PROTECTION,
            format!(
                "{} failed attempt(s) in a row during a {}-day streak",
                p.current_lose_streak, p.practice_streak_days
            ),
        ));
    }

    if state.recurring_mistakes {
        // Sorted most frequent first by the mistake store.
        if let Some((mistake_type, count)) = s.recurring_by_type.iter().find(|(_, n)| *n > 0) {
            let mut t = template(
                MissionType::MistakeRecovery,
                format!("Break the {} habit", mistake_type.label().to_lowercase()),
                format!(
                    "Solve three exercises without a {} mistake.",
                    mistake_type.label().to_lowercase()
                ),
                3,
                60,
                2,
                PRIORITY_MISTAKE_RECOVERY,
                format!("{} recurring {} mistake(s) this week", count, mistake_type.as_str()),
            );
            t.target_mistake_type = Some(*mistake_type);
            out.push(t);
        }
    }

    if let Some((topic, weakness)) = weakest_topic(p).filter(|_| state.weak_topic) {
        let mut t = template(
            MissionType::WeaknessTraining,
            "Train your weakest topic".to_string(),
            "Pass three exercises in the topic that gives you the most trouble.".to_string(),
            3,
            75,
            2,
            PRIORITY_WEAKNESS_TRAINING,
            format!("topic {} weakness {:.0} above {:.0}", topic, weakness, WEAKNESS_THRESHOLD),
        );
        t.target_topic = Some(topic);
        out.push(t);
    }

    if state.low_confidence {
        out.push(template(
            MissionType::ConfidenceBoost,
            "Quick wins".to_string(),
            "Pass three easy exercises.".to_string(),
            3,
            40,
            1,
            PRIORITY_CONFIDENCE_BOOST,
            format!("confidence {:.0} below {:.0}", p.confidence_index, LOW_CONFIDENCE_THRESHOLD),
        ));
    }

    if state.low_momentum {
        out.push(template(
            MissionType::MomentumPush,
            "Build momentum".to_string(),
            "Pass four exercises today.".to_string(),
            4,
            50,
            2,
            PRIORITY_MOMENTUM_PUSH,
            format!("momentum {:.0} below {:.0}", p.momentum_score, LOW_MOMENTUM_THRESHOLD),
        ));
    }

    if let Some(node) = next_skill_node(&s.skill_nodes).filter(|_| state.skill_unlock) {
        let mut t = template(
            MissionType::SkillUnlock,
            format!("Unlock {}", node.name),
            format!("Pass two exercises in {} to finish the node.", node.name),
            2,
            100,
            3,
            PRIORITY_SKILL_UNLOCK,
            format!("{} is {:.0}% complete", node.name, node.progress_pct),
        );
        t.target_topic = Some(node.node_id);
        out.push(t);
    }

    if state.low_consistency {
        out.push(template(
            MissionType::ConsistencyBuilder,
            "Show up today".to_string(),
            "Pass one exercise today, however small.".to_string(),
            1,
            30,
            1,
            PRIORITY_CONSISTENCY_BUILDER,
            format!(
                "consistency {:.0} below {:.0}",
                p.consistency_score, LOW_CONSISTENCY_THRESHOLD
            ),
        ));
    }

    out
}

fn fillers(p: &CognitiveProfile) -> Vec<MissionTemplate> {
    let mut out = vec![template(
        MissionType::ReviewSession,
        "Review session".to_string(),
        "Revisit two exercises you have not solved yet.".to_string(),
        2,
        30,
        2,
        PRIORITY_REVIEW_SESSION,
        "regular review".to_string(),
    )];
    if p.accuracy_rate > SPEED_CHALLENGE_ACCURACY {
        out.push(template(
            MissionType::SpeedChallenge,
            "Speed challenge".to_string(),
            "Pass three exercises faster than your average.".to_string(),
            3,
            60,
            3,
            PRIORITY_SPEED_CHALLENGE,
            format!("accuracy {:.2} above {:.2}", p.accuracy_rate, SPEED_CHALLENGE_ACCURACY),
        ));
    }
    if p.accuracy_rate < ACCURACY_FOCUS_ACCURACY {
        out.push(template(
            MissionType::AccuracyFocus,
            "Accuracy focus".to_string(),
            "Pass three exercises on the first try.".to_string(),
            3,
            45,
            2,
            PRIORITY_ACCURACY_FOCUS,
            format!("accuracy {:.2} below {:.2}", p.accuracy_rate, ACCURACY_FOCUS_ACCURACY),
        ));
    }
    out
}

/// Ranked mission templates for the snapshot, at most `count`.
pub fn generate(snapshot: &MissionSnapshot, count: usize) -> Vec<MissionTemplate> {
    let state = UserState::from_snapshot(snapshot);
    let mut candidates = condition_missions(snapshot, &state);

    if candidates.len() < count {
        for filler in fillers(&snapshot.profile) {
            if candidates.len() >= count {
                break;
            }
            if candidates.iter().all(|c| c.mission_type != filler.mission_type) {
                candidates.push(filler);
            }
        }
    }

    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
    candidates.truncate(count);
    debug!("[Missions] State {:?} -> {} mission(s)", state, candidates.len());
    candidates
}

pub fn load_snapshot(conn: &Connection, user_id: i64, now: i64) -> CoreResult<MissionSnapshot> {
    Ok(MissionSnapshot {
        profile: profile::get_or_create(conn, user_id, now)?,
        recurring_by_type: mistakes::recurring_by_type(conn, user_id, now)?,
        skill_nodes: repository::get_skill_progress(conn, user_id)?,
    })
}

pub fn generate_for_user(
    conn: &Connection,
    user_id: i64,
    count: usize,
    now: i64,
) -> CoreResult<Vec<MissionTemplate>> {
    let snapshot = load_snapshot(conn, user_id, now)?;
    Ok(generate(&snapshot, count))
}

/// UTC calendar day of `ts`, as `YYYY-MM-DD`.
pub fn day_key(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.div_euclid(DAY_SECONDS).to_string())
}

pub fn next_day_start(ts: i64) -> i64 {
    (ts.div_euclid(DAY_SECONDS) + 1) * DAY_SECONDS
}

/// Replaces today's active missions with `templates`.
pub fn materialize(
    conn: &Connection,
    user_id: i64,
    templates: &[MissionTemplate],
    now: i64,
) -> CoreResult<Vec<Mission>> {
    let day = day_key(now);
    let expires_at = next_day_start(now);

    let tx = conn.unchecked_transaction()?;
    let retired = repository::deactivate_missions_for_day(&tx, user_id, &day)?;
    for t in templates {
        repository::insert_mission(&tx, user_id, t, &day, expires_at, now)?;
    }
    let missions = repository::get_active_missions(&tx, user_id, &day)?;
    tx.commit()?;

    info!(
        "[Missions] User {} has {} mission(s) for {} ({} retired)",
        user_id,
        missions.len(),
        day,
        retired
    );
    Ok(missions)
}

/// Advances today's open missions after a passing attempt. Returns the
/// missions whose progress changed.
pub fn record_progress(
    conn: &Connection,
    user_id: i64,
    topic_id: Option<i64>,
    passed: bool,
    now: i64,
) -> CoreResult<Vec<Mission>> {
    if !passed {
        return Ok(Vec::new());
    }
    let day = day_key(now);
    let mut advanced = Vec::new();
    for mut mission in repository::get_active_missions(conn, user_id, &day)? {
        if mission.completed_at.is_some() || mission.expires_at <= now {
            continue;
        }
        let applies = match (mission.template.target_topic, mission.template.mission_type) {
            // Skill-unlock targets are skill-tree nodes, which count any pass.
            (_, MissionType::SkillUnlock) => true,
            (Some(target), _) => topic_id == Some(target),
            (None, _) => true,
        };
        if !applies {
            continue;
        }
        mission.progress = (mission.progress + 1).min(mission.template.target_value);
        if mission.progress >= mission.template.target_value {
            mission.completed_at = Some(now);
            info!(
                "[Missions] User {} completed {} (+{} XP)",
                user_id,
                mission.template.mission_type.as_str(),
                mission.template.xp_reward
            );
        }
        repository::update_mission_progress(conn, mission.id, mission.progress, mission.completed_at)?;
        advanced.push(mission);
    }
    Ok(advanced)
}
