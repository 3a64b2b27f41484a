use learning_core::constants::DAY_SECONDS;
use learning_core::database::init_db;
use learning_core::error::CoreError;
use learning_core::feedback::{feedback_queue, NoopPublisher};
use learning_core::locks::UserLocks;
use learning_core::models::{
    AttemptSubmission, Category, ExecutionResult, ExecutionStatus, MissionType, MistakeType,
    TestOutcome,
};
use learning_core::{pedagogy, profile, repository};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::Connection;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const NOW: i64 = 1_760_000_000;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_db(&conn, true).unwrap();
    conn
}

fn outcome(index: u32, expected: &str, actual: &str) -> TestOutcome {
    TestOutcome {
        index,
        input: String::new(),
        expected: expected.to_string(),
        actual: Some(actual.to_string()),
        passed: expected == actual,
        error: None,
        hidden: false,
    }
}

fn submission(user_id: i64, attempt_id: i64, exercise_id: i64, pass: bool) -> AttemptSubmission {
    let tests = if pass {
        vec![outcome(0, "10", "10"), outcome(1, "3", "3")]
    } else {
        vec![outcome(0, "10", "9"), outcome(1, "3", "3")]
    };
    AttemptSubmission {
        user_id,
        attempt_id,
        exercise_id,
        result: ExecutionResult {
            source_code: "for (int i = 1; i < n; i++) { total += i; }".to_string(),
            compiler_output: None,
            runtime_error: None,
            tests: Some(tests),
            duration_ms: 45_000,
            status: if pass {
                ExecutionStatus::Pass
            } else {
                ExecutionStatus::Fail
            },
        },
    }
}

#[test]
fn failed_attempt_flows_through_every_stage() {
    let conn = setup();
    let locks = UserLocks::new();
    let (publisher, rx) = feedback_queue(8);

    let out = pedagogy::process_attempt(&conn, &locks, &publisher, &submission(1, 1, 101, false), NOW)
        .unwrap();
    assert!(!out.duplicate);
    assert_eq!(out.classification.category, Category::OffByOne);
    let mistake = out.mistake.unwrap();
    assert_eq!(mistake.mistake_type, MistakeType::OffByOne);
    assert_eq!(mistake.topic_id, Some(1));

    let p = profile::get_or_create(&conn, 1, NOW).unwrap();
    assert_eq!(p.total_attempts, 1);
    assert_eq!(p.current_lose_streak, 1);
    assert_eq!(p.total_mistakes, 1);
    assert!(p.topic_weakness(1) > 50.0);

    let event = rx.try_recv().unwrap();
    assert_eq!(event.attempt_id, 1);
    assert_eq!(event.question_id, 101);
}

#[test]
fn runner_payload_with_null_fields_is_still_recorded() {
    let conn = setup();
    let locks = UserLocks::new();
    let raw = r#"{"user_id":1,"attempt_id":7,"exercise_id":101,"result":{"source_code":null,"compiler_output":null,"runtime_error":null,"duration_ms":null,"status":"FAIL","tests":[{"index":0,"input":null,"expected":null,"actual":"3","passed":false}]}}"#;
    let sub: AttemptSubmission = serde_json::from_str(raw).unwrap();
    assert_eq!(sub.result.source_code, "");
    assert_eq!(sub.result.tests.as_ref().unwrap()[0].expected, "");

    let out = pedagogy::process_attempt(&conn, &locks, &NoopPublisher, &sub, NOW).unwrap();
    assert!(!out.duplicate);
    assert_eq!(out.classification.test_analysis.failed, 1);
    assert!(repository::attempt_exists(&conn, 7).unwrap());
    assert_eq!(profile::get_or_create(&conn, 1, NOW).unwrap().total_attempts, 1);
}

#[test]
fn replayed_attempt_is_not_applied_twice() {
    let conn = setup();
    let locks = UserLocks::new();
    let sub = submission(1, 7, 101, true);

    pedagogy::process_attempt(&conn, &locks, &NoopPublisher, &sub, NOW).unwrap();
    let replay = pedagogy::process_attempt(&conn, &locks, &NoopPublisher, &sub, NOW + 5).unwrap();
    assert!(replay.duplicate);

    let p = profile::get_or_create(&conn, 1, NOW).unwrap();
    assert_eq!(p.total_attempts, 1);
    assert_eq!(p.total_passes, 1);
}

#[test]
fn two_distinct_passes_apply_two_increments() {
    let conn = setup();
    let locks = UserLocks::new();
    pedagogy::process_attempt(&conn, &locks, &NoopPublisher, &submission(1, 1, 101, true), NOW).unwrap();
    let after_one = profile::get_or_create(&conn, 1, NOW).unwrap();
    pedagogy::process_attempt(&conn, &locks, &NoopPublisher, &submission(1, 2, 101, true), NOW + 60)
        .unwrap();
    let after_two = profile::get_or_create(&conn, 1, NOW).unwrap();

    assert_eq!(after_two.total_passes, 2);
    assert_eq!(after_two.current_win_streak, 2);
    assert!(after_two.topic_strength(1) > after_one.topic_strength(1));
    assert_eq!(after_two.version, after_one.version + 1);
}

#[test]
fn unknown_exercise_is_rejected_before_anything_is_stored() {
    let conn = setup();
    let err = pedagogy::process_attempt(
        &conn,
        &UserLocks::new(),
        &NoopPublisher,
        &submission(1, 1, 9_999, false),
        NOW,
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::UnknownExercise(9_999)));
    assert!(!repository::attempt_exists(&conn, 1).unwrap());
}

#[test]
fn next_exercise_starts_in_root_topic_then_falls_back_to_review() {
    let conn = setup();
    let locks = UserLocks::new();
    let mut rng = StdRng::seed_from_u64(3);

    let first = pedagogy::get_next_exercise(&conn, 5, &mut rng, NOW).unwrap().unwrap();
    assert!([101, 102, 103].contains(&first.id));
    assert_eq!(first.topic_name, "Variables and Output");

    for (i, ex) in [101, 102, 103].into_iter().enumerate() {
        pedagogy::process_attempt(
            &conn,
            &locks,
            &NoopPublisher,
            &submission(5, 100 + i as i64, ex, false),
            NOW + i as i64,
        )
        .unwrap();
    }

    let review = pedagogy::get_next_exercise(&conn, 5, &mut rng, NOW + 10).unwrap().unwrap();
    assert_eq!(review.id, 101);
    assert!(review.reason.starts_with("Review"));
}

#[test]
fn recompute_twice_on_same_history_is_identical() {
    let conn = setup();
    let locks = UserLocks::new();
    for i in 0..12 {
        let ex = [101, 102, 103][i % 3];
        pedagogy::process_attempt(
            &conn,
            &locks,
            &NoopPublisher,
            &submission(2, i as i64 + 1, ex, i % 4 != 0),
            NOW - (12 - i as i64) * 3_600,
        )
        .unwrap();
    }
    pedagogy::record_session(&conn, 2, 1_800, NOW - 100).unwrap();

    let mut a = pedagogy::recompute_profile(&conn, &locks, 2, NOW).unwrap();
    let mut b = pedagogy::recompute_profile(&conn, &locks, 2, NOW).unwrap();
    assert_eq!(b.version, a.version + 1);
    a.version = 0;
    b.version = 0;
    assert_eq!(a, b);
    assert_eq!(a.total_attempts, 12);
    assert_eq!(a.preferred_session_minutes, 30.0);
}

#[test]
fn stale_version_write_is_refused() {
    let conn = setup();
    let stale = profile::get_or_create(&conn, 3, NOW).unwrap();
    profile::apply_attempt(&conn, 3, Some(1), true, NOW).unwrap();
    assert!(!repository::update_profile_if_version(&conn, &stale, stale.version).unwrap());
}

#[test]
fn burnt_out_learner_gets_rest_mission_and_fillers() {
    let conn = setup();
    let mut p = profile::get_or_create(&conn, 4, NOW).unwrap();
    p.burnout_risk_score = 70.0;
    p.current_lose_streak = 0;
    repository::replace_profile(&conn, &p).unwrap();

    let missions = pedagogy::plan_missions(&conn, 4, 3, NOW).unwrap();
    let kinds: Vec<MissionType> = missions.iter().map(|m| m.template.mission_type).collect();
    assert_eq!(
        kinds,
        vec![
            MissionType::BurnoutPrevention,
            MissionType::ReviewSession,
            MissionType::AccuracyFocus
        ]
    );
    assert_eq!(missions[0].template.priority, 95);
    assert!(missions.iter().all(|m| m.expires_at == NOW - NOW % DAY_SECONDS + DAY_SECONDS));
}

#[test]
fn concurrent_attempts_for_one_user_are_serialized() {
    let path = std::env::temp_dir().join(format!(
        "learning-core-test-{}-{}.db",
        std::process::id(),
        NOW
    ));
    let _ = std::fs::remove_file(&path);
    {
        let conn = Connection::open(&path).unwrap();
        init_db(&conn, true).unwrap();
    }

    let locks = Arc::new(UserLocks::new());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let locks = Arc::clone(&locks);
            let path = path.clone();
            thread::spawn(move || {
                let conn = Connection::open(&path).unwrap();
                conn.busy_timeout(Duration::from_secs(10)).unwrap();
                for i in 0..5 {
                    let attempt_id = t * 100 + i + 1;
                    pedagogy::process_attempt(
                        &conn,
                        &locks,
                        &NoopPublisher,
                        &submission(9, attempt_id, 201, i % 2 == 0),
                        NOW + attempt_id,
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    let p = profile::get_or_create(&conn, 9, NOW).unwrap();
    assert_eq!(p.total_attempts, 20);
    assert_eq!(p.total_passes, 12);
    drop(conn);
    let _ = std::fs::remove_file(&path);
}
