// src/mistakes.rs

//! Behavioral mistake log.
//!
//! Each failed attempt becomes one row with a behavioral type, a skill area
//! detected from the source, and a recurrence flag. Rows are immutable except
//! for resolution.

use crate::classifier::{self, char_similarity, clip, pattern};
use crate::constants::*;
use crate::error::CoreResult;
use crate::models::{
    Category, Classification, DiffPattern, ExecutionResult, ExecutionStatus, MistakeLog,
    MistakePatterns, MistakeTrend, MistakeType, Resolution, SkillArea, TrendDirection,
};
use crate::{profile, repository};
use log::{debug, info, warn};
use regex::Regex;
use rusqlite::Connection;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

// --- Skill area dictionary ---
pattern!(
    RE_AREA_LOOPS,
    r"\bfor\s*\(|\bwhile\s*\(|\bdo\s*\{|\.forEach\("
);
pattern!(
    RE_AREA_ARRAYS,
    r"\w\s*\[\s*\]|\bnew\s+\w+\s*\[|\w\[[^\]]+\]|\bArrays\.|\bArrayList\b"
);
pattern!(
    RE_AREA_STRINGS,
    r"\bString\b|\.charAt\(|\.substring\(|\.split\(|\bStringBuilder\b|\.toCharArray\(|\.equals\("
);
pattern!(
    RE_AREA_CONDITIONALS,
    r"\bif\s*\(|\belse\b|\bswitch\s*\("
);
pattern!(
    RE_AREA_METHODS,
    r"\b(?:public|private|protected)\s+(?:static\s+)?[\w<>\[\]]+\s+\w+\s*\(|\breturn\b"
);
pattern!(
    RE_AREA_CLASSES,
    r"\bclass\s+\w+|\bnew\s+[A-Z]\w*\s*\(|\bthis\.|\binterface\s+\w+|\bextends\b"
);
pattern!(
    RE_AREA_IO,
    r"\bScanner\b|System\.in\b|System\.out\.print|\bBufferedReader\b"
);
pattern!(
    RE_METHOD_DECL,
    r"\b(?:public|private|protected|static)\s+(?:static\s+)?[\w<>\[\]]+\s+(\w+)\s*\("
);

static AREA_PATTERNS: [(SkillArea, &LazyLock<Option<Regex>>); 7] = [
    (SkillArea::Loops, &RE_AREA_LOOPS),
    (SkillArea::Arrays, &RE_AREA_ARRAYS),
    (SkillArea::Strings, &RE_AREA_STRINGS),
    (SkillArea::Conditionals, &RE_AREA_CONDITIONALS),
    (SkillArea::Methods, &RE_AREA_METHODS),
    (SkillArea::Classes, &RE_AREA_CLASSES),
    (SkillArea::Io, &RE_AREA_IO),
];

fn count_hits(re: &LazyLock<Option<Regex>>, text: &str) -> usize {
    match &**re {
        Some(r) => r.find_iter(text).count(),
        None => 0,
    }
}

/// Calls to a declared method from anywhere other than its declaration.
fn recursion_hits(source: &str) -> usize {
    let Some(decl) = &*RE_METHOD_DECL else {
        return 0;
    };
    let mut total = 0;
    for cap in decl.captures_iter(source) {
        let Some(name) = cap.get(1) else { continue };
        if name.as_str() == "main" {
            continue;
        }
        let Ok(call) = Regex::new(&format!(r"(?:^|[^\w.]){}\s*\(", regex::escape(name.as_str())))
        else {
            continue;
        };
        let uses = call.find_iter(source).count();
        // One occurrence is the declaration itself.
        if uses >= 2 {
            total += uses - 1;
        }
    }
    total
}

/// The area with the most keyword hits. `None` on a tie or no hits.
pub fn detect_skill_area(source: &str) -> Option<SkillArea> {
    let source = clip(source, MAX_SOURCE_SCAN_CHARS);
    let mut counts: Vec<(SkillArea, usize)> = AREA_PATTERNS
        .iter()
        .map(|(area, re)| (*area, count_hits(re, source)))
        .collect();
    counts.push((SkillArea::Recursion, recursion_hits(source)));

    let best = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if best == 0 {
        return None;
    }
    let mut leaders = counts.iter().filter(|(_, n)| *n == best);
    match (leaders.next(), leaders.next()) {
        (Some((area, _)), None) => Some(*area),
        _ => None,
    }
}

// --- Behavioral type ---

fn has_pattern(c: &Classification, id: &str) -> bool {
    c.matched_patterns.iter().any(|p| p == id)
}

/// Maps an execution result and its diagnosis to a behavioral mistake type.
pub fn derive_mistake_type(result: &ExecutionResult, c: &Classification) -> MistakeType {
    match result.status {
        ExecutionStatus::Timeout => return MistakeType::Timeout,
        ExecutionStatus::MemoryExceeded => return MistakeType::Memory,
        ExecutionStatus::CompileError => {
            return if has_pattern(c, "type_mismatch") {
                MistakeType::TypeError
            } else {
                MistakeType::Syntax
            };
        }
        _ => {}
    }

    match c.category {
        Category::Timeout => return MistakeType::Timeout,
        Category::Syntax => return MistakeType::Syntax,
        Category::NullHandling => return MistakeType::NullReference,
        Category::TypeError => return MistakeType::TypeError,
        Category::RuntimeError => return MistakeType::Other,
        Category::Logic if has_pattern(c, "out_of_memory") => return MistakeType::Memory,
        Category::Logic if has_pattern(c, "stack_overflow") => return MistakeType::Logic,
        Category::EdgeCase if has_pattern(c, "index_out_of_bounds") => {
            return MistakeType::EdgeCase
        }
        _ => {}
    }

    let Some(tests) = &result.tests else {
        return MistakeType::Other;
    };
    let analysis = &c.test_analysis;
    if analysis.total == 0 {
        return MistakeType::Incomplete;
    }
    let failure_rate = analysis.failed as f64 / analysis.total as f64;
    if failure_rate > MISUNDERSTANDING_FAILURE_RATE {
        return MistakeType::Misunderstanding;
    }
    if analysis.hidden_failed && analysis.passed > 0 {
        return MistakeType::EdgeCase;
    }
    match analysis.dominant_pattern {
        Some(DiffPattern::OffByOne) => return MistakeType::OffByOne,
        Some(DiffPattern::OutputFormat) => return MistakeType::OutputFormat,
        _ => {}
    }

    let failed: Vec<_> = tests.iter().filter(|t| !t.passed).collect();
    if failed.iter().any(|t| t.actual.is_none()) {
        return MistakeType::Incomplete;
    }
    let near_miss = failed.len() == 1
        && failed.iter().all(|t| {
            let actual = t.actual.as_deref().unwrap_or("");
            char_similarity(
                clip(&t.expected, MAX_COMPARE_CHARS),
                clip(actual, MAX_COMPARE_CHARS),
            ) >= CARELESS_SIMILARITY
        });
    if near_miss {
        MistakeType::Careless
    } else {
        MistakeType::Logic
    }
}

fn error_text(result: &ExecutionResult) -> Option<String> {
    result
        .runtime_error
        .as_deref()
        .or(result.compiler_output.as_deref())
        .or_else(|| {
            result
                .tests
                .as_deref()
                .and_then(|ts| ts.iter().find_map(|t| t.error.as_deref()))
        })
        .filter(|e| !e.trim().is_empty())
        .map(|e| clip(e, ERROR_TEXT_MAX_CHARS).to_string())
}

// --- Public Interface ---

/// Classifies and records a failed attempt. Returns `None` for a clean run.
pub fn record(
    conn: &Connection,
    user_id: i64,
    attempt_id: i64,
    question_id: i64,
    result: &ExecutionResult,
    now: i64,
) -> CoreResult<Option<MistakeLog>> {
    let classification = classifier::classify(result);
    record_classified(conn, user_id, attempt_id, question_id, result, &classification, now)
}

/// Same as [`record`] for callers that already hold the classification.
pub fn record_classified(
    conn: &Connection,
    user_id: i64,
    attempt_id: i64,
    question_id: i64,
    result: &ExecutionResult,
    classification: &Classification,
    now: i64,
) -> CoreResult<Option<MistakeLog>> {
    if result.status.ran_to_completion()
        && result.tests.is_some()
        && classification.test_analysis.failed == 0
    {
        debug!("[Mistakes] Attempt {} passed cleanly, nothing to log", attempt_id);
        return Ok(None);
    }

    let mistake_type = derive_mistake_type(result, classification);
    let skill_area = detect_skill_area(&result.source_code);
    let topic_id = repository::get_exercise_meta(conn, question_id)?.map(|(t, _)| t);

    let since = now - RECURRENCE_WINDOW_DAYS * DAY_SECONDS;
    let prior = repository::count_matching_mistakes(conn, user_id, mistake_type, skill_area, since)?;
    let is_recurring = prior >= RECURRING_PRIOR_COUNT;

    let detail = classification
        .signals
        .first()
        .cloned()
        .unwrap_or_else(|| classification.suggested_focus.clone());

    let mut log = MistakeLog {
        id: 0,
        user_id,
        question_id,
        attempt_id,
        mistake_type,
        severity: classification.severity,
        description: format!("{}: {}", mistake_type.label(), detail),
        code_snippet: clip(&result.source_code, CODE_SNIPPET_MAX_CHARS).to_string(),
        error_text: error_text(result),
        is_recurring,
        topic_id,
        skill_area,
        resolution: Resolution::Unresolved,
        created_at: now,
    };
    log.id = repository::insert_mistake(conn, &log)?;
    // The row is stored; a failed counter update is caught up by recompute.
    if let Err(e) = profile::apply_mistake(conn, user_id, mistake_type, now) {
        warn!(
            "[Mistakes] Mistake {} stored but profile counters not updated for user {}: {}",
            log.id, user_id, e
        );
    }

    info!(
        "[Mistakes] User {} attempt {}: {} in {} (prior {} this week{})",
        user_id,
        attempt_id,
        mistake_type.as_str(),
        skill_area.map_or("unknown area", |a| a.as_str()),
        prior,
        if is_recurring { ", recurring" } else { "" }
    );
    Ok(Some(log))
}

/// Aggregated mistake counts and the week-over-week trend.
pub fn get_patterns(conn: &Connection, user_id: i64, now: i64) -> CoreResult<MistakePatterns> {
    let by_type: BTreeMap<MistakeType, i64> = repository::count_mistakes_by_type(conn, user_id)?
        .into_iter()
        .collect();

    let mut by_skill_area = BTreeMap::new();
    let mut unclassified_area = 0;
    for (area, count) in repository::count_mistakes_by_area(conn, user_id)? {
        match area {
            Some(a) => {
                by_skill_area.insert(a, count);
            }
            None => unclassified_area += count,
        }
    }

    let week = TREND_WINDOW_DAYS * DAY_SECONDS;
    let recent_count = repository::count_mistakes_between(conn, user_id, now - week, now + 1)?;
    let prior_count =
        repository::count_mistakes_between(conn, user_id, now - 2 * week, now - week)?;

    Ok(MistakePatterns {
        by_type,
        by_skill_area,
        unclassified_area,
        recent_recurring: repository::get_recent_recurring(conn, user_id, RECENT_RECURRING_LIMIT)?,
        trend: trend(recent_count, prior_count),
    })
}

pub fn trend(recent_count: i64, prior_count: i64) -> MistakeTrend {
    let direction = match recent_count.cmp(&prior_count) {
        std::cmp::Ordering::Less => TrendDirection::Improving,
        std::cmp::Ordering::Greater => TrendDirection::Worsening,
        std::cmp::Ordering::Equal => TrendDirection::Stable,
    };
    let percent_change = if prior_count == 0 {
        if recent_count > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        (recent_count - prior_count) as f64 / prior_count as f64 * 100.0
    };
    MistakeTrend {
        direction,
        recent_count,
        prior_count,
        percent_change,
    }
}

/// Marks a mistake resolved with the learner's lesson. Returns `false` when
/// the mistake does not exist or was already resolved.
pub fn resolve(conn: &Connection, mistake_id: i64, lesson: &str, now: i64) -> CoreResult<bool> {
    let changed = repository::resolve_mistake(conn, mistake_id, now, lesson)? == 1;
    if changed {
        info!("[Mistakes] Resolved mistake {}", mistake_id);
    }
    Ok(changed)
}

/// Unresolved recurring mistakes per type within the recurrence window.
pub fn recurring_by_type(
    conn: &Connection,
    user_id: i64,
    now: i64,
) -> CoreResult<Vec<(MistakeType, i64)>> {
    let since = now - RECURRENCE_WINDOW_DAYS * DAY_SECONDS;
    let mut counts: HashMap<MistakeType, i64> = HashMap::new();
    for (t, n) in repository::count_recurring_by_type(conn, user_id, since)? {
        *counts.entry(t).or_insert(0) += n;
    }
    let mut out: Vec<(MistakeType, i64)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_db;
    use crate::models::TestOutcome;

    const NOW: i64 = 1_760_000_000;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn, true).unwrap();
        conn
    }

    fn test(index: u32, expected: &str, actual: Option<&str>, passed: bool) -> TestOutcome {
        TestOutcome {
            index,
            input: String::new(),
            expected: expected.to_string(),
            actual: actual.map(str::to_string),
            passed,
            error: None,
            hidden: false,
        }
    }

    fn failing(source: &str, tests: Vec<TestOutcome>) -> ExecutionResult {
        ExecutionResult {
            source_code: source.to_string(),
            compiler_output: None,
            runtime_error: None,
            tests: Some(tests),
            duration_ms: 120,
            status: ExecutionStatus::Fail,
        }
    }

    #[test]
    fn detects_dominant_skill_area() {
        let loops = "for (int i = 0; i < n; i++) { while (x > 0) { x--; } }";
        assert_eq!(detect_skill_area(loops), Some(SkillArea::Loops));

        let recursive = "static int fact(int n) { if (n == 0) return 1; return n * fact(n - 1) + fact(0) * 0 + fact(0) * 0; }";
        assert_eq!(detect_skill_area(recursive), Some(SkillArea::Recursion));

        assert_eq!(detect_skill_area("x = 1;"), None);
    }

    #[test]
    fn recursion_counts_only_bare_calls_to_the_method() {
        let lookalikes =
            "static int fact(int n) { return helper.fact(n) + artifact(n) + artifact(n); }";
        assert_eq!(recursion_hits(lookalikes), 0);

        let spaced = "static int fact(int n) { return n * fact (n - 1); }";
        assert_eq!(recursion_hits(spaced), 1);
    }

    #[test]
    fn tie_yields_no_area() {
        // One loop keyword and one conditional keyword.
        assert_eq!(detect_skill_area("while (a) { if (b) { } }"), None);
    }

    #[test]
    fn mostly_failing_tests_are_misunderstanding() {
        let r = failing(
            "",
            vec![
                test(0, "1", Some("7"), false),
                test(1, "2", Some("9"), false),
                test(2, "3", Some("8"), false),
                test(3, "4", Some("4"), true),
            ],
        );
        let c = classifier::classify(&r);
        assert_eq!(derive_mistake_type(&r, &c), MistakeType::Misunderstanding);
    }

    #[test]
    fn single_near_miss_is_careless() {
        let r = failing(
            "",
            vec![
                test(0, "hello world", Some("hello word"), false),
                test(1, "a", Some("a"), true),
                test(2, "b", Some("b"), true),
            ],
        );
        let c = classifier::classify(&r);
        assert_eq!(derive_mistake_type(&r, &c), MistakeType::Careless);
    }

    #[test]
    fn status_drives_type_before_tests() {
        let mut r = failing("", vec![]);
        r.status = ExecutionStatus::Timeout;
        let c = classifier::classify(&r);
        assert_eq!(derive_mistake_type(&r, &c), MistakeType::Timeout);

        r.status = ExecutionStatus::CompileError;
        r.compiler_output = Some("error: incompatible types: String cannot be converted to int".into());
        let c = classifier::classify(&r);
        assert_eq!(derive_mistake_type(&r, &c), MistakeType::TypeError);
    }

    #[test]
    fn clean_pass_is_not_recorded() {
        let conn = setup();
        let r = ExecutionResult {
            status: ExecutionStatus::Pass,
            ..failing("", vec![test(0, "1", Some("1"), true)])
        };
        assert!(record(&conn, 1, 1, 101, &r, NOW).unwrap().is_none());
    }

    #[test]
    fn stored_mistake_is_returned_when_profile_update_fails() {
        let conn = setup();
        conn.execute_batch("DROP TABLE cognitive_profiles;").unwrap();
        let r = failing("", vec![test(0, "5", Some("4"), false)]);

        let log = record(&conn, 1, 1, 101, &r, NOW).unwrap().unwrap();
        assert!(log.id > 0);
        let stored = repository::get_mistake(&conn, log.id).unwrap().unwrap();
        assert_eq!(stored.attempt_id, 1);
        assert_eq!(stored.mistake_type, log.mistake_type);
    }

    #[test]
    fn third_matching_mistake_in_a_week_is_recurring() {
        let conn = setup();
        let src = "for (int i = 0; i <= n; i++) { while (true) {} }";
        let r = failing(
            src,
            vec![
                test(0, "5", Some("4"), false),
                test(1, "2", Some("2"), true),
                test(2, "3", Some("3"), true),
            ],
        );

        let first = record(&conn, 1, 1, 101, &r, NOW - 3 * DAY_SECONDS).unwrap().unwrap();
        let second = record(&conn, 1, 2, 101, &r, NOW - DAY_SECONDS).unwrap().unwrap();
        let third = record(&conn, 1, 3, 102, &r, NOW).unwrap().unwrap();
        assert_eq!(first.mistake_type, MistakeType::OffByOne);
        assert_eq!(first.skill_area, Some(SkillArea::Loops));
        assert!(!first.is_recurring);
        assert!(!second.is_recurring);
        assert!(third.is_recurring);

        let profile = profile::get_or_create(&conn, 1, NOW).unwrap();
        assert_eq!(profile.total_mistakes, 3);
        assert_eq!(profile.mistake_type_frequency[&MistakeType::OffByOne], 3);
    }

    #[test]
    fn snippet_and_error_are_truncated() {
        let conn = setup();
        let src = "x".repeat(2_000);
        let mut r = failing(&src, vec![test(0, "1", None, false)]);
        r.status = ExecutionStatus::RuntimeError;
        r.runtime_error = Some("E".repeat(1_000));
        let log = record(&conn, 1, 1, 101, &r, NOW).unwrap().unwrap();
        assert_eq!(log.code_snippet.chars().count(), CODE_SNIPPET_MAX_CHARS);
        assert_eq!(
            log.error_text.as_deref().map(|e| e.chars().count()),
            Some(ERROR_TEXT_MAX_CHARS)
        );
    }

    #[test]
    fn patterns_report_trend_and_resolution() {
        let conn = setup();
        let r = failing("", vec![test(0, "abc", Some("zzz"), false)]);
        record(&conn, 1, 1, 101, &r, NOW - 10 * DAY_SECONDS).unwrap();
        record(&conn, 1, 2, 101, &r, NOW - DAY_SECONDS).unwrap();
        let third = record(&conn, 1, 3, 101, &r, NOW).unwrap().unwrap();

        let patterns = get_patterns(&conn, 1, NOW).unwrap();
        assert_eq!(patterns.trend.recent_count, 2);
        assert_eq!(patterns.trend.prior_count, 1);
        assert_eq!(patterns.trend.direction, TrendDirection::Worsening);
        assert!((patterns.trend.percent_change - 100.0).abs() < 1e-9);
        assert_eq!(patterns.unclassified_area, 3);

        assert!(resolve(&conn, third.id, "read the output format", NOW).unwrap());
        assert!(!resolve(&conn, third.id, "again", NOW).unwrap());
        let stored = repository::get_mistake(&conn, third.id).unwrap().unwrap();
        assert!(stored.resolution.was_resolved());
    }

    #[test]
    fn trend_from_zero_prior() {
        assert_eq!(trend(3, 0).percent_change, 100.0);
        assert_eq!(trend(0, 0).percent_change, 0.0);
        assert_eq!(trend(0, 0).direction, TrendDirection::Stable);
        assert_eq!(trend(1, 4).direction, TrendDirection::Improving);
    }
}
