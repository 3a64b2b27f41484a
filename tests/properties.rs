use learning_core::classifier::{char_similarity, classify};
use learning_core::missions::generate;
use learning_core::mistakes::detect_skill_area;
use learning_core::models::{
    Category, CognitiveProfile, ExecutionResult, ExecutionStatus, MissionSnapshot, MistakeType,
    TestOutcome,
};
use learning_core::profile::apply_attempt_to;
use proptest::prelude::*;

fn passing_test(index: u32, value: String) -> TestOutcome {
    TestOutcome {
        index,
        input: String::new(),
        expected: value.clone(),
        actual: Some(value),
        passed: true,
        error: None,
        hidden: false,
    }
}

fn status_strategy() -> impl Strategy<Value = ExecutionStatus> {
    prop_oneof![
        Just(ExecutionStatus::Pass),
        Just(ExecutionStatus::Fail),
        Just(ExecutionStatus::CompileError),
        Just(ExecutionStatus::RuntimeError),
        Just(ExecutionStatus::Timeout),
        Just(ExecutionStatus::MemoryExceeded),
    ]
}

proptest! {
    #[test]
    fn timeout_status_always_classifies_as_timeout(
        source in ".{0,300}",
        diagnostics in proptest::option::of(".{0,200}"),
        outputs in proptest::collection::vec((".{0,20}", ".{0,20}"), 0..6),
    ) {
        let tests = outputs
            .into_iter()
            .enumerate()
            .map(|(i, (expected, actual))| TestOutcome {
                index: i as u32,
                input: String::new(),
                passed: expected == actual,
                expected,
                actual: Some(actual),
                error: None,
                hidden: false,
            })
            .collect();
        let result = ExecutionResult {
            source_code: source,
            compiler_output: None,
            runtime_error: diagnostics,
            tests: Some(tests),
            duration_ms: 10_000,
            status: ExecutionStatus::Timeout,
        };
        let c = classify(&result);
        prop_assert_eq!(c.category, Category::Timeout);
        prop_assert!((3..=5).contains(&c.severity), "severity {}", c.severity);
    }

    #[test]
    fn clean_runs_never_look_like_crashes(
        source in ".{0,300}",
        values in proptest::collection::vec("[a-z0-9 ]{0,10}", 0..8),
        failed_status in any::<bool>(),
    ) {
        let tests = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| passing_test(i as u32, v))
            .collect();
        let result = ExecutionResult {
            source_code: source,
            compiler_output: None,
            runtime_error: None,
            tests: Some(tests),
            duration_ms: 5,
            status: if failed_status { ExecutionStatus::Fail } else { ExecutionStatus::Pass },
        };
        let c = classify(&result);
        prop_assert!(!matches!(
            c.category,
            Category::Timeout | Category::Syntax | Category::RuntimeError
        ));
    }

    #[test]
    fn classification_is_bounded_for_any_status(
        status in status_strategy(),
        compiler in proptest::option::of(".{0,200}"),
        source in ".{0,500}",
    ) {
        let result = ExecutionResult {
            source_code: source,
            compiler_output: compiler,
            runtime_error: None,
            tests: None,
            duration_ms: 0,
            status,
        };
        let c = classify(&result);
        prop_assert!((1..=5).contains(&c.severity));
    }

    #[test]
    fn similarity_is_a_ratio(a in ".{0,50}", b in ".{0,50}") {
        let s = char_similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s));
        prop_assert_eq!(s, char_similarity(&b, &a));
    }

    #[test]
    fn topic_scores_stay_in_bounds(outcomes in proptest::collection::vec(any::<bool>(), 0..200)) {
        let mut p = CognitiveProfile::new(1, 0);
        for passed in outcomes {
            apply_attempt_to(&mut p, Some(1), passed);
            prop_assert!((0.0..=100.0).contains(&p.topic_strength(1)));
            prop_assert!((0.0..=100.0).contains(&p.topic_weakness(1)));
            prop_assert!((0.0..=100.0).contains(&p.confidence_index));
            prop_assert!((0.0..=100.0).contains(&p.momentum_score));
        }
    }

    #[test]
    fn passes_never_lower_strength(n in 1usize..100) {
        let mut p = CognitiveProfile::new(1, 0);
        let mut last = p.topic_strength(1);
        for _ in 0..n {
            apply_attempt_to(&mut p, Some(1), true);
            prop_assert!(p.topic_strength(1) >= last);
            last = p.topic_strength(1);
        }
    }

    #[test]
    fn missions_are_ranked_unique_and_repeatable(
        burnout in 0.0f64..100.0,
        confidence in 0.0f64..100.0,
        momentum in 0.0f64..100.0,
        accuracy in 0.0f64..1.0,
        lose_streak in 0i64..5,
        streak_days in 0i64..30,
        recurring in 0i64..4,
        count in 1usize..8,
    ) {
        let mut p = CognitiveProfile::new(1, 0);
        p.burnout_risk_score = burnout;
        p.confidence_index = confidence;
        p.momentum_score = momentum;
        p.accuracy_rate = accuracy;
        p.current_lose_streak = lose_streak;
        p.practice_streak_days = streak_days;
        let snapshot = MissionSnapshot {
            profile: p,
            recurring_by_type: vec![(MistakeType::Logic, recurring)],
            skill_nodes: Vec::new(),
        };
        let a = generate(&snapshot, count);
        prop_assert_eq!(&a, &generate(&snapshot, count));
        prop_assert!(a.len() <= count);
        prop_assert!(a.windows(2).all(|w| w[0].priority >= w[1].priority));
        for (i, m) in a.iter().enumerate() {
            prop_assert!(a[i + 1..].iter().all(|o| o.mission_type != m.mission_type));
        }
    }

    #[test]
    fn skill_area_detection_accepts_any_text(source in ".{0,2000}") {
        let _ = detect_skill_area(&source);
    }
}
