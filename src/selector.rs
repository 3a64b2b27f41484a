// src/selector.rs

use crate::constants::*;
use crate::models::{CognitiveProfile, ExerciseCandidate, Selection};
use log::debug;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

/// Topics whose prerequisites are all strong enough. Topics without
/// prerequisites are always unlocked.
pub fn unlocked_topics(
    topic_ids: &[i64],
    prereqs: &[(i64, i64)],
    profile: &CognitiveProfile,
) -> Vec<i64> {
    let mut required: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for (topic, prereq) in prereqs {
        required.entry(*topic).or_default().push(*prereq);
    }
    topic_ids
        .iter()
        .copied()
        .filter(|t| {
            required.get(t).map_or(true, |reqs| {
                reqs.iter()
                    .all(|r| profile.topic_strength(*r) >= TOPIC_UNLOCK_THRESHOLD)
            })
        })
        .collect()
}

/// Deterministic part of a candidate's score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub fit: f64,
    pub weakness: f64,
    pub streak: f64,
    pub recent_failure: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.fit + self.weakness + self.streak - self.recent_failure
    }
}

/// Difficulty level (1..=3) the learner is ready for in a topic.
fn target_level(strength: f64) -> f64 {
    1.0 + (strength / 50.0).clamp(0.0, 2.0)
}

pub fn score_candidate(
    candidate: &ExerciseCandidate,
    profile: &CognitiveProfile,
    recent_failed_topics: &BTreeSet<i64>,
) -> ScoreBreakdown {
    let level = f64::from(candidate.difficulty.level());
    let target = target_level(profile.topic_strength(candidate.topic_id));
    let fit = (FIT_MAX_SCORE - (level - target).abs() * FIT_PENALTY_PER_LEVEL).max(0.0);

    let weakness = profile.topic_weakness(candidate.topic_id) / SCORE_MAX * WEAKNESS_MAX_SCORE;

    // Ride a winning streak upward, rebuild after losses with easier work.
    let streak = if profile.current_win_streak >= WIN_STREAK_FOR_STRETCH && level > target {
        STREAK_BONUS
    } else if profile.current_lose_streak >= LOSE_STREAK_FOR_REBUILD && level < target {
        STREAK_BONUS
    } else {
        0.0
    };

    let recent_failure = if recent_failed_topics.contains(&candidate.topic_id) {
        RECENT_FAILURE_PENALTY
    } else {
        0.0
    };

    ScoreBreakdown {
        fit,
        weakness,
        streak,
        recent_failure,
    }
}

/// Picks the highest-scoring candidate after jitter. Ties keep the earlier
/// candidate.
pub fn select<R: Rng>(
    profile: &CognitiveProfile,
    candidates: &[ExerciseCandidate],
    recent_failed_topics: &[i64],
    rng: &mut R,
) -> Option<(ExerciseCandidate, Selection)> {
    let failed: BTreeSet<i64> = recent_failed_topics.iter().copied().collect();
    let mut best: Option<(&ExerciseCandidate, ScoreBreakdown, f64, f64)> = None;

    for candidate in candidates {
        let breakdown = score_candidate(candidate, profile, &failed);
        let jitter = rng.gen_range(0.0..=JITTER_MAX);
        let score = breakdown.total() + jitter;
        debug!(
            "[Selector] Candidate {} ({}): {:.1} + jitter {:.1}",
            candidate.exercise_id, candidate.difficulty, breakdown.total(), jitter
        );
        if best.as_ref().map_or(true, |(_, _, _, s)| score > *s) {
            best = Some((candidate, breakdown, jitter, score));
        }
    }

    let (candidate, b, jitter, score) = best?;
    let reason = format!(
        "{} ({} in topic {}): fit {:.1}, weakness {:.1}, streak {:+.1}, recent failure -{:.1}, jitter {:.1}; best of {}",
        candidate.title,
        candidate.difficulty,
        candidate.topic_id,
        b.fit,
        b.weakness,
        b.streak,
        b.recent_failure,
        jitter,
        candidates.len()
    );
    let selection = Selection {
        exercise_id: candidate.exercise_id,
        score,
        pool_size: candidates.len(),
        reason,
    };
    Some((candidate.clone(), selection))
}
