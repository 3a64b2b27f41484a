// src/classifier.rs

//! Deterministic diagnosis of a failed attempt.
//!
//! `classify` is pure: no state, no I/O, and bounded work per call (inputs are
//! clipped before any pattern matching). The first matching branch wins:
//! timeout, compile diagnostics, runtime exceptions, then test-output diffs.
//! Static risk patterns in the source are appended as extra signals on every
//! path without changing the category.

use crate::constants::*;
use crate::models::{
    Category, Classification, DiffPattern, ExecutionResult, ExecutionStatus, TestAnalysis,
    TestOutcome,
};
use log::debug;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

macro_rules! pattern {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}
pub(crate) use pattern;

pub(crate) fn is_hit(re: &LazyLock<Option<Regex>>, text: &str) -> bool {
    match &**re {
        Some(r) => r.is_match(text),
        None => false,
    }
}

// --- Timeout ---
pattern!(
    RE_TIMEOUT,
    r"(?i)\btime\s*limit\s*exceeded\b|\b(?:execution\s+)?timed\s+out\b|\bexecution\s+timeout\b"
);

// --- Compiler diagnostics ---
pattern!(
    RE_MISSING_SEMICOLON,
    r"(?i)';'\s*expected|expected\s*';'|missing\s+semicolon"
);
pattern!(
    RE_UNCLOSED_BRACKET,
    r"(?i)'[)\]}]'\s*expected|reached\s+end\s+of\s+file\s+while\s+parsing|unclosed\s+(?:bracket|brace|paren)"
);
pattern!(
    RE_UNCLOSED_STRING,
    r"(?i)unclosed\s+(?:string|character)\s+literal|unterminated\s+string"
);
pattern!(
    RE_UNDEFINED_SYMBOL,
    r"(?i)cannot\s+find\s+symbol|is\s+not\s+defined|undeclared|cannot\s+resolve\s+symbol"
);
pattern!(RE_MISSING_RETURN, r"(?i)missing\s+return\s+statement");
pattern!(
    RE_TYPE_MISMATCH,
    r"(?i)incompatible\s+types|cannot\s+be\s+converted\s+to|possible\s+lossy\s+conversion"
);

struct SyntaxPattern {
    id: &'static str,
    regex: &'static LazyLock<Option<Regex>>,
    signal: &'static str,
}

static SYNTAX_PATTERNS: [SyntaxPattern; 6] = [
    SyntaxPattern {
        id: "missing_semicolon",
        regex: &RE_MISSING_SEMICOLON,
        signal: "Missing statement terminator (;)",
    },
    SyntaxPattern {
        id: "unclosed_bracket",
        regex: &RE_UNCLOSED_BRACKET,
        signal: "Unclosed bracket or brace",
    },
    SyntaxPattern {
        id: "unclosed_string",
        regex: &RE_UNCLOSED_STRING,
        signal: "Unclosed string literal",
    },
    SyntaxPattern {
        id: "undefined_symbol",
        regex: &RE_UNDEFINED_SYMBOL,
        signal: "Reference to a name that is not defined",
    },
    SyntaxPattern {
        id: "missing_return",
        regex: &RE_MISSING_RETURN,
        signal: "A code path finishes without returning a value",
    },
    SyntaxPattern {
        id: "type_mismatch",
        regex: &RE_TYPE_MISMATCH,
        signal: "Declared type does not match the assigned value",
    },
];

// --- Runtime exceptions ---
pattern!(
    RE_INDEX_OUT_OF_BOUNDS,
    r"(?i)(?:Array|String)?IndexOutOfBounds|index\s+out\s+of\s+(?:range|bounds)"
);
pattern!(
    RE_NULL_POINTER,
    r"(?i)NullPointerException|null\s+reference|cannot\s+read\s+propert(?:y|ies)\s+of\s+(?:null|undefined)"
);
pattern!(
    RE_ARITHMETIC,
    r"(?i)ArithmeticException|/\s*by\s*zero|division\s+by\s+zero"
);
pattern!(
    RE_NUMBER_FORMAT,
    r"(?i)NumberFormatException|InputMismatchException"
);
pattern!(RE_CLASS_CAST, r"(?i)ClassCastException");
pattern!(
    RE_STACK_OVERFLOW,
    r"(?i)StackOverflowError|maximum\s+recursion\s+depth|too\s+much\s+recursion"
);
pattern!(
    RE_OUT_OF_MEMORY,
    r"(?i)OutOfMemoryError|heap\s+space|memory\s+limit"
);

struct RuntimePattern {
    id: &'static str,
    regex: &'static LazyLock<Option<Regex>>,
    category: Category,
    signal: &'static str,
}

static RUNTIME_PATTERNS: [RuntimePattern; 7] = [
    RuntimePattern {
        id: "index_out_of_bounds",
        regex: &RE_INDEX_OUT_OF_BOUNDS,
        category: Category::EdgeCase,
        signal: "Index outside the bounds of an array or string",
    },
    RuntimePattern {
        id: "null_pointer",
        regex: &RE_NULL_POINTER,
        category: Category::NullHandling,
        signal: "Dereferenced a null value",
    },
    RuntimePattern {
        id: "divide_by_zero",
        regex: &RE_ARITHMETIC,
        category: Category::TypeError,
        signal: "Arithmetic error such as division by zero",
    },
    RuntimePattern {
        id: "number_format",
        regex: &RE_NUMBER_FORMAT,
        category: Category::TypeError,
        signal: "Input could not be parsed as a number",
    },
    RuntimePattern {
        id: "class_cast",
        regex: &RE_CLASS_CAST,
        category: Category::TypeError,
        signal: "Invalid cast between types",
    },
    RuntimePattern {
        id: "stack_overflow",
        regex: &RE_STACK_OVERFLOW,
        category: Category::Logic,
        signal: "Recursion never reaches its base case",
    },
    RuntimePattern {
        id: "out_of_memory",
        regex: &RE_OUT_OF_MEMORY,
        category: Category::Logic,
        signal: "Memory grows without bound",
    },
];

// --- Static risks in source ---
pattern!(
    RE_BOUND_LENGTH_MINUS_ONE,
    r"for\s*\([^;]*;[^;]*<\s*[\w.]+\s*\.\s*(?:length|size\(\))\s*-\s*1\s*;"
);
pattern!(
    RE_BOUND_INCLUSIVE_LENGTH,
    r"for\s*\([^;]*;[^;]*<=\s*[\w.]+\s*\.\s*(?:length|size\(\))\s*;"
);
pattern!(
    RE_LOOP_STARTS_AT_ONE,
    r"for\s*\(\s*(?:int\s+)?\w+\s*=\s*1\s*;"
);
pattern!(RE_LENGTH_ACCESS, r"\.\s*(?:length\b|size\(\))");
pattern!(
    RE_EMPTY_GUARD,
    r"(?i)[=!]=\s*null|isEmpty\(\)|(?:length|size\(\))\s*(?:==|<=|<)\s*[01]\b"
);
pattern!(
    RE_COLLECTION_PARAM,
    r"\(\s*(?:[^()]*,\s*)?(?:int\s*\[\s*\]|String|List<[^>]*>)\s+\w+\s*[,)]"
);
pattern!(
    RE_INT_MULTIPLICATION,
    r"\bint\s+\w+\s*=\s*[^;]*[\w\])]\s*\*\s*[\w(]"
);
pattern!(
    RE_HARDCODED_RETURN,
    r#"return\s+(?:-?\d{2,}|[2-9]|"[^"]+")\s*;"#
);

/// Classifies one execution result.
pub fn classify(result: &ExecutionResult) -> Classification {
    let analysis = analyze_tests(result);
    let diagnostics = diagnostic_text(result);

    let mut c = if result.status.ran_to_completion()
        && result.tests.is_some()
        && analysis.failed == 0
    {
        Classification {
            category: Category::Other,
            severity: SEVERITY_MIN,
            signals: vec!["All tests passed".to_string()],
            matched_patterns: Vec::new(),
            suggested_focus: "review the solution for readability and edge cases".to_string(),
            test_analysis: analysis.clone(),
        }
    } else if result.status == ExecutionStatus::Timeout
        || (result.status != ExecutionStatus::CompileError && is_hit(&RE_TIMEOUT, &diagnostics))
    {
        Classification {
            category: Category::Timeout,
            severity: SEVERITY_TIMEOUT,
            signals: vec!["Execution exceeded the time limit".to_string()],
            matched_patterns: vec!["timeout".to_string()],
            suggested_focus: "check for infinite loops or inefficient algorithms".to_string(),
            test_analysis: analysis.clone(),
        }
    } else if let Some(c) = classify_syntax(result, &analysis) {
        c
    } else if let Some(c) = classify_runtime(result, &analysis) {
        c
    } else {
        classify_test_diff(result, &analysis)
    };

    append_static_risks(&result.source_code, &mut c);

    if let Some(ratio) = analysis.pass_ratio() {
        if ratio >= HIGH_PASS_RATIO {
            c.severity = c.severity.saturating_sub(1).max(SEVERITY_MIN);
        } else if ratio == 0.0 {
            c.severity = (c.severity + 1).min(SEVERITY_MAX);
        }
    }

    dedup(&mut c.signals);
    dedup(&mut c.matched_patterns);

    debug!(
        "[Classifier] {:?} -> {} (severity {}, {} signals)",
        result.status,
        c.category.as_str(),
        c.severity,
        c.signals.len()
    );
    c
}

/// Clips `s` to at most `max_chars` characters.
pub fn clip(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn diagnostic_text(result: &ExecutionResult) -> String {
    let mut text = String::new();
    for part in [&result.compiler_output, &result.runtime_error]
        .into_iter()
        .flatten()
    {
        text.push_str(clip(part, MAX_DIAGNOSTIC_SCAN_CHARS));
        text.push('\n');
    }
    text
}

fn classify_syntax(result: &ExecutionResult, analysis: &TestAnalysis) -> Option<Classification> {
    let diagnostics = result
        .compiler_output
        .as_deref()
        .map(|d| clip(d, MAX_DIAGNOSTIC_SCAN_CHARS))
        .unwrap_or("");
    let hits: Vec<&SyntaxPattern> = SYNTAX_PATTERNS
        .iter()
        .filter(|p| is_hit(p.regex, diagnostics))
        .collect();

    if result.status != ExecutionStatus::CompileError && hits.is_empty() {
        return None;
    }

    let mut signals: Vec<String> = hits.iter().map(|p| p.signal.to_string()).collect();
    if signals.is_empty() {
        signals.push("Compilation failed".to_string());
    }
    Some(Classification {
        category: Category::Syntax,
        severity: SEVERITY_SYNTAX,
        signals,
        matched_patterns: hits.iter().map(|p| p.id.to_string()).collect(),
        suggested_focus: "read the first compiler error and fix the line it points to"
            .to_string(),
        test_analysis: analysis.clone(),
    })
}

fn classify_runtime(result: &ExecutionResult, analysis: &TestAnalysis) -> Option<Classification> {
    let mut text = String::new();
    if let Some(err) = &result.runtime_error {
        text.push_str(clip(err, MAX_DIAGNOSTIC_SCAN_CHARS));
    }
    for t in result.tests.iter().flatten().take(MAX_ANALYZED_TESTS) {
        if let Some(err) = &t.error {
            text.push('\n');
            text.push_str(clip(err, MAX_COMPARE_CHARS));
        }
    }

    let hit = RUNTIME_PATTERNS.iter().find(|p| is_hit(p.regex, &text));
    let runtime_status = matches!(
        result.status,
        ExecutionStatus::RuntimeError | ExecutionStatus::MemoryExceeded
    );
    if !runtime_status && hit.is_none() {
        return None;
    }

    let (category, signal, ids) = match hit {
        Some(p) => (p.category, p.signal.to_string(), vec![p.id.to_string()]),
        None if result.status == ExecutionStatus::MemoryExceeded => (
            Category::Logic,
            "Memory limit exceeded".to_string(),
            vec!["memory_exceeded".to_string()],
        ),
        None => (
            Category::RuntimeError,
            "The program crashed at runtime".to_string(),
            Vec::new(),
        ),
    };
    let focus = match category {
        Category::EdgeCase => "check index bounds for empty and single-element inputs",
        Category::NullHandling => "guard against null before using a value",
        Category::TypeError => "validate inputs before arithmetic, parsing or casting",
        Category::Logic => "make sure recursion and data growth are bounded",
        _ => "read the stack trace and reproduce the crash locally",
    };
    Some(Classification {
        category,
        severity: SEVERITY_RUNTIME,
        signals: vec![signal],
        matched_patterns: ids,
        suggested_focus: focus.to_string(),
        test_analysis: analysis.clone(),
    })
}

fn analyze_tests(result: &ExecutionResult) -> TestAnalysis {
    let Some(tests) = &result.tests else {
        return TestAnalysis::default();
    };
    let total = tests.len();
    let passed = tests.iter().filter(|t| t.passed).count();
    let failed_tests: Vec<&TestOutcome> = tests
        .iter()
        .filter(|t| !t.passed)
        .take(MAX_ANALYZED_TESTS)
        .collect();
    let hidden_failed = tests.iter().any(|t| t.hidden && !t.passed);

    let diffs = diff_counts(&failed_tests);
    let half = failed_tests.len() as f64 / 2.0;
    let dominant_pattern = if failed_tests.is_empty() {
        None
    } else if diffs.off_by_one as f64 > half {
        Some(DiffPattern::OffByOne)
    } else if diffs.format() as f64 > half {
        Some(DiffPattern::OutputFormat)
    } else if diffs.low_similarity as f64 > half {
        Some(DiffPattern::LogicError)
    } else {
        None
    };

    TestAnalysis {
        total,
        passed,
        failed: total - passed,
        hidden_failed,
        dominant_pattern,
    }
}

#[derive(Default)]
struct DiffCounts {
    off_by_one: usize,
    case_only: usize,
    whitespace_only: usize,
    low_similarity: usize,
    no_output: usize,
}

impl DiffCounts {
    fn format(&self) -> usize {
        self.case_only + self.whitespace_only
    }
}

/// Each failing test counts toward at most one pattern, checked in order
/// off-by-one, format, low similarity.
fn diff_counts(failed: &[&TestOutcome]) -> DiffCounts {
    let mut counts = DiffCounts::default();
    for t in failed {
        let Some(actual) = &t.actual else {
            counts.no_output += 1;
            continue;
        };
        let expected = clip(&t.expected, MAX_COMPARE_CHARS);
        let actual = clip(actual, MAX_COMPARE_CHARS);
        if is_off_by_one(expected, actual) {
            counts.off_by_one += 1;
        } else if expected != actual && expected.to_lowercase() == actual.to_lowercase() {
            counts.case_only += 1;
        } else if expected != actual && normalize_whitespace(expected) == normalize_whitespace(actual)
        {
            counts.whitespace_only += 1;
        } else if char_similarity(expected, actual) < LOW_SIMILARITY_THRESHOLD {
            counts.low_similarity += 1;
        }
    }
    counts
}

fn is_off_by_one(expected: &str, actual: &str) -> bool {
    match (expected.trim().parse::<f64>(), actual.trim().parse::<f64>()) {
        (Ok(e), Ok(a)) => ((e - a).abs() - 1.0).abs() < 1e-9,
        _ => false,
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaccard index over the character sets of both strings.
pub fn char_similarity(a: &str, b: &str) -> f64 {
    let sa: BTreeSet<char> = a.chars().collect();
    let sb: BTreeSet<char> = b.chars().collect();
    let union = sa.union(&sb).count();
    if union == 0 {
        return 1.0;
    }
    sa.intersection(&sb).count() as f64 / union as f64
}

fn classify_test_diff(result: &ExecutionResult, analysis: &TestAnalysis) -> Classification {
    let Some(tests) = &result.tests else {
        return Classification {
            category: Category::Other,
            severity: SEVERITY_RUNTIME,
            signals: vec!["Runner reported no test results".to_string()],
            matched_patterns: vec!["missing_test_results".to_string()],
            suggested_focus: "resubmit; the runner did not report any tests".to_string(),
            test_analysis: analysis.clone(),
        };
    };

    let failed: Vec<&TestOutcome> = tests
        .iter()
        .filter(|t| !t.passed)
        .take(MAX_ANALYZED_TESTS)
        .collect();
    let counts = diff_counts(&failed);

    let mut signals = Vec::new();
    let mut ids = Vec::new();
    if counts.off_by_one > 0 {
        ids.push("diff_off_by_one".to_string());
        if let Some(t) = failed.iter().find(|t| {
            t.actual
                .as_deref()
                .map_or(false, |a| is_off_by_one(&t.expected, a))
        }) {
            signals.push(format!(
                "Expected {} but got {} (off by one)",
                clip(t.expected.trim(), 40),
                clip(t.actual.as_deref().unwrap_or("").trim(), 40)
            ));
        }
    }
    if counts.case_only > 0 {
        ids.push("diff_case_only".to_string());
        signals.push("Output differs from the expected answer only in letter case".to_string());
    }
    if counts.whitespace_only > 0 {
        ids.push("diff_whitespace_only".to_string());
        signals.push("Output differs from the expected answer only in whitespace".to_string());
    }
    if counts.low_similarity > 0 {
        ids.push("diff_low_similarity".to_string());
        signals.push("Output shares little with the expected answer".to_string());
    }
    if counts.no_output > 0 {
        signals.push(format!("{} failing test(s) produced no output", counts.no_output));
    }

    let (mut category, severity, mut focus) = match analysis.dominant_pattern {
        Some(DiffPattern::OffByOne) => (
            Category::OffByOne,
            SEVERITY_OFF_BY_ONE,
            "check loop bounds and index arithmetic",
        ),
        Some(DiffPattern::OutputFormat) => (
            Category::OutputFormat,
            SEVERITY_OUTPUT_FORMAT,
            "match the expected output format exactly",
        ),
        Some(DiffPattern::LogicError) | None => (
            Category::Logic,
            SEVERITY_LOGIC,
            "trace the algorithm by hand on a failing input",
        ),
    };

    if analysis.hidden_failed && analysis.passed > 0 {
        category = Category::EdgeCase;
        focus = "consider boundary inputs: empty, single element, negative and maximum values";
        ids.push("hidden_test_failure".to_string());
        signals.push("Visible tests pass but hidden tests fail".to_string());
    }

    Classification {
        category,
        severity,
        signals,
        matched_patterns: ids,
        suggested_focus: focus.to_string(),
        test_analysis: analysis.clone(),
    }
}

fn append_static_risks(source: &str, c: &mut Classification) {
    let source = clip(source, MAX_SOURCE_SCAN_CHARS);
    if source.trim().is_empty() {
        return;
    }
    let guarded = is_hit(&RE_EMPTY_GUARD, source);
    let length_access = is_hit(&RE_LENGTH_ACCESS, source);

    let checks: [(&str, bool, &str); 7] = [
        (
            "loop_bound_length_minus_one",
            is_hit(&RE_BOUND_LENGTH_MINUS_ONE, source),
            "Loop stops before length - 1; the last element may be skipped",
        ),
        (
            "loop_bound_inclusive_length",
            is_hit(&RE_BOUND_INCLUSIVE_LENGTH, source),
            "Loop runs while index <= length and reads past the end",
        ),
        (
            "loop_starts_at_one",
            is_hit(&RE_LOOP_STARTS_AT_ONE, source),
            "Loop starts at 1; the first element may be skipped",
        ),
        (
            "unguarded_length_access",
            length_access && !guarded,
            "Length is read without a null or empty check",
        ),
        (
            "int_overflow_multiplication",
            is_hit(&RE_INT_MULTIPLICATION, source),
            "Multiplication stored in an int may overflow",
        ),
        (
            "hardcoded_return",
            is_hit(&RE_HARDCODED_RETURN, source),
            "Returns a hard-coded literal",
        ),
        (
            "missing_empty_guard",
            !guarded && !length_access && is_hit(&RE_COLLECTION_PARAM, source),
            "No guard for empty or zero-length input",
        ),
    ];

    for (id, _, signal) in checks
        .iter()
        .filter(|(_, hit, _)| *hit)
        .take(MAX_STATIC_RISK_SIGNALS)
    {
        c.matched_patterns.push(id.to_string());
        c.signals.push(signal.to_string());
    }
}

fn dedup(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|s| seen.insert(s.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn result(status: ExecutionStatus, tests: Vec<TestOutcome>) -> ExecutionResult {
        ExecutionResult {
            source_code: String::new(),
            compiler_output: None,
            runtime_error: None,
            tests: Some(tests),
            duration_ms: 120,
            status,
        }
    }

    #[test]
    fn off_by_one_numeric_diff() {
        let r = result(ExecutionStatus::Fail, vec![test(0, "10", Some("9"), false)]);
        let c = classify(&r);
        assert_eq!(c.category, Category::OffByOne);
        assert_eq!(c.test_analysis.dominant_pattern, Some(DiffPattern::OffByOne));
        // pass ratio 0 raises severity
        assert_eq!(c.severity, SEVERITY_OFF_BY_ONE + 1);
    }

    #[test]
    fn case_only_mismatch_is_output_format() {
        let r = result(
            ExecutionStatus::Fail,
            vec![test(0, "Hello", Some("hello"), false)],
        );
        let c = classify(&r);
        assert_eq!(c.category, Category::OutputFormat);
        assert!(c.signals.iter().any(|s| s.contains("case")));
    }

    #[test]
    fn whitespace_only_mismatch_is_output_format() {
        let r = result(
            ExecutionStatus::Fail,
            vec![
                test(0, "1 2 3", Some("1  2 3 "), false),
                test(1, "4", Some("4"), true),
            ],
        );
        assert_eq!(classify(&r).category, Category::OutputFormat);
    }

    #[test]
    fn no_majority_defaults_to_logic() {
        let r = result(
            ExecutionStatus::Fail,
            vec![
                test(0, "10", Some("9"), false),
                test(1, "Hello", Some("hello"), false),
            ],
        );
        assert_eq!(classify(&r).category, Category::Logic);
    }

    #[test]
    fn hidden_failure_with_partial_success_is_edge_case() {
        let mut hidden = test(2, "0", Some("-1"), false);
        hidden.hidden = true;
        let r = result(
            ExecutionStatus::Fail,
            vec![test(0, "3", Some("3"), true), test(1, "5", Some("5"), true), hidden],
        );
        let c = classify(&r);
        assert_eq!(c.category, Category::EdgeCase);
        assert!(c.suggested_focus.contains("boundary"));
        // off-by-one severity survives the override
        assert_eq!(c.severity, SEVERITY_OFF_BY_ONE);
    }

    #[test]
    fn timeout_status_wins() {
        let r = result(ExecutionStatus::Timeout, vec![test(0, "1", None, false)]);
        let c = classify(&r);
        assert_eq!(c.category, Category::Timeout);
        assert_eq!(c.severity, 5);
    }

    #[test]
    fn compile_error_reports_syntax_signals() {
        let mut r = result(ExecutionStatus::CompileError, vec![]);
        r.compiler_output = Some("Main.java:4: error: ';' expected".to_string());
        let c = classify(&r);
        assert_eq!(c.category, Category::Syntax);
        assert!(c.matched_patterns.contains(&"missing_semicolon".to_string()));
    }

    #[test]
    fn timeout_identifier_in_compiler_output_is_still_syntax() {
        let mut r = result(ExecutionStatus::CompileError, vec![]);
        r.compiler_output = Some(
            "Main.java:3: error: incompatible types: String cannot be converted to int\n        int timeout = \"5\";\n                      ^"
                .to_string(),
        );
        let c = classify(&r);
        assert_eq!(c.category, Category::Syntax);
        assert_eq!(c.severity, SEVERITY_SYNTAX);
        assert!(c.matched_patterns.contains(&"type_mismatch".to_string()));
    }

    #[test]
    fn runner_timeout_message_without_timeout_status() {
        let mut r = result(ExecutionStatus::RuntimeError, vec![]);
        r.runtime_error = Some("Process timed out after 2000 ms".to_string());
        assert_eq!(classify(&r).category, Category::Timeout);

        r.runtime_error = Some("java.lang.IllegalStateException: timeoutMillis < 0".to_string());
        assert_ne!(classify(&r).category, Category::Timeout);
    }

    #[test]
    fn high_pass_ratio_lowers_severity_by_one() {
        let mut tests: Vec<_> = (0..4).map(|i| test(i, "ok", Some("ok"), true)).collect();
        tests.push(test(4, "true", Some("0"), false));
        let c = classify(&result(ExecutionStatus::Fail, tests));
        assert_eq!(c.category, Category::Logic);
        assert_eq!(c.test_analysis.pass_ratio(), Some(0.8));
        assert_eq!(c.severity, SEVERITY_LOGIC - 1);
    }

    #[test]
    fn high_pass_ratio_never_drops_below_minimum_severity() {
        let mut tests: Vec<_> = (0..4).map(|i| test(i, "ok", Some("ok"), true)).collect();
        tests.push(test(4, "Hello", Some("hello"), false));
        let c = classify(&result(ExecutionStatus::Fail, tests));
        assert_eq!(c.category, Category::OutputFormat);
        assert_eq!(c.severity, SEVERITY_MIN);
    }

    #[test]
    fn runtime_exceptions_map_to_categories() {
        let cases = [
            ("java.lang.ArrayIndexOutOfBoundsException: 5", Category::EdgeCase),
            ("java.lang.NullPointerException", Category::NullHandling),
            ("java.lang.ArithmeticException: / by zero", Category::TypeError),
            ("java.lang.StackOverflowError", Category::Logic),
            ("something odd happened", Category::RuntimeError),
        ];
        for (err, expected) in cases {
            let mut r = result(ExecutionStatus::RuntimeError, vec![]);
            r.runtime_error = Some(err.to_string());
            assert_eq!(classify(&r).category, expected, "for {}", err);
        }
    }

    #[test]
    fn missing_test_list_is_other() {
        let mut r = result(ExecutionStatus::Fail, vec![]);
        r.tests = None;
        let c = classify(&r);
        assert_eq!(c.category, Category::Other);
    }

    #[test]
    fn static_risks_are_capped_and_do_not_change_category() {
        let mut r = result(ExecutionStatus::Fail, vec![test(0, "10", Some("9"), false)]);
        r.source_code = r#"
            int solve(int[] a) {
                int p = a[0] * a[1];
                for (int i = 1; i <= a.length; i++) { p += a[i]; }
                return 42;
            }"#
        .to_string();
        let c = classify(&r);
        assert_eq!(c.category, Category::OffByOne);
        let static_ids = [
            "loop_bound_length_minus_one",
            "loop_bound_inclusive_length",
            "loop_starts_at_one",
            "unguarded_length_access",
            "int_overflow_multiplication",
            "hardcoded_return",
            "missing_empty_guard",
        ];
        let hits = c
            .matched_patterns
            .iter()
            .filter(|p| static_ids.contains(&p.as_str()))
            .count();
        assert_eq!(hits, MAX_STATIC_RISK_SIGNALS);
    }

    #[test]
    fn all_passing_run_is_not_an_error_category() {
        let r = result(
            ExecutionStatus::Pass,
            vec![test(0, "1", Some("1"), true), test(1, "2", Some("2"), true)],
        );
        let c = classify(&r);
        assert_eq!(c.category, Category::Other);
        assert_eq!(c.severity, SEVERITY_MIN);
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("héllo", 2), "hé");
        assert_eq!(clip("hi", 10), "hi");
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(char_similarity("", ""), 1.0);
        assert_eq!(char_similarity("abc", "xyz"), 0.0);
        assert!((char_similarity("abc", "abd") - 0.5).abs() < 1e-9);
    }
}
