// src/models.rs

use crate::config::AppConfig;
use crate::feedback::FeedbackPublisher;
use crate::locks::UserLocks;
use rusqlite::Connection;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

// --- App State ---

pub struct AppState {
    pub db: Mutex<Connection>,
    pub locks: UserLocks,
    pub feedback: Box<dyn FeedbackPublisher>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(conn: Connection, feedback: Box<dyn FeedbackPublisher>, config: AppConfig) -> Self {
        AppState {
            db: Mutex::new(conn),
            locks: UserLocks::new(),
            feedback,
            config,
        }
    }
}

// --- Catalog ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy = 1,
    Medium = 2,
    Hard = 3,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn level(&self) -> u8 {
        *self as u8
    }
}

impl FromStr for Difficulty {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Easy" => Ok(Difficulty::Easy),
            "Medium" => Ok(Difficulty::Medium),
            "Hard" => Ok(Difficulty::Hard),
            _ => Ok(Difficulty::Medium),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExerciseView {
    pub id: i64,
    pub title: String,
    pub difficulty: String,
    pub topic_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseCandidate {
    pub exercise_id: i64,
    pub title: String,
    pub topic_id: i64,
    pub difficulty: Difficulty,
}

// Used for seeding
#[derive(Deserialize)]
pub struct JsonCatalog {
    pub topics: Vec<JsonTopic>,
    pub exercises: Vec<JsonExercise>,
}

#[derive(Deserialize)]
pub struct JsonTopic {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub prereqs: Vec<i64>,
}

#[derive(Deserialize)]
pub struct JsonExercise {
    pub id: i64,
    pub title: String,
    pub difficulty: String,
    pub topic_id: i64,
}

// --- Execution Input ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pass,
    Fail,
    CompileError,
    RuntimeError,
    Timeout,
    MemoryExceeded,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pass => "PASS",
            ExecutionStatus::Fail => "FAIL",
            ExecutionStatus::CompileError => "COMPILE_ERROR",
            ExecutionStatus::RuntimeError => "RUNTIME_ERROR",
            ExecutionStatus::Timeout => "TIMEOUT",
            ExecutionStatus::MemoryExceeded => "MEMORY_EXCEEDED",
        }
    }

    /// PASS and FAIL mean the program ran to completion.
    pub fn ran_to_completion(&self) -> bool {
        matches!(self, ExecutionStatus::Pass | ExecutionStatus::Fail)
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(ExecutionStatus::Pass),
            "FAIL" => Ok(ExecutionStatus::Fail),
            "COMPILE_ERROR" => Ok(ExecutionStatus::CompileError),
            "RUNTIME_ERROR" => Ok(ExecutionStatus::RuntimeError),
            "TIMEOUT" => Ok(ExecutionStatus::Timeout),
            "MEMORY_EXCEEDED" => Ok(ExecutionStatus::MemoryExceeded),
            other => Err(format!("unknown execution status: {}", other)),
        }
    }
}

/// Runner payloads send `null` for fields they could not fill.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expected: String,
    #[serde(default)]
    pub actual: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub passed: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hidden: bool,
}

/// Output of the sandboxed runner for one submission.
///
/// `tests` is optional on the wire: a runner that crashed before reporting
/// any test results sends `null`, which classifies as [`Category::Other`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_code: String,
    #[serde(default)]
    pub compiler_output: Option<String>,
    #[serde(default)]
    pub runtime_error: Option<String>,
    #[serde(default)]
    pub tests: Option<Vec<TestOutcome>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration_ms: u64,
    pub status: ExecutionStatus,
}

impl ExecutionResult {
    pub fn test_counts(&self) -> (usize, usize) {
        let tests = self.tests.as_deref().unwrap_or(&[]);
        let passed = tests.iter().filter(|t| t.passed).count();
        (tests.len(), passed)
    }

    /// A clean pass: status PASS and no failing test.
    pub fn is_success(&self) -> bool {
        let (total, passed) = self.test_counts();
        self.status == ExecutionStatus::Pass && passed == total
    }
}

// --- Classification ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Syntax,
    Logic,
    EdgeCase,
    Timeout,
    OutputFormat,
    NullHandling,
    OffByOne,
    TypeError,
    RuntimeError,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Syntax => "SYNTAX",
            Category::Logic => "LOGIC",
            Category::EdgeCase => "EDGE_CASE",
            Category::Timeout => "TIMEOUT",
            Category::OutputFormat => "OUTPUT_FORMAT",
            Category::NullHandling => "NULL_HANDLING",
            Category::OffByOne => "OFF_BY_ONE",
            Category::TypeError => "TYPE_ERROR",
            Category::RuntimeError => "RUNTIME_ERROR",
            Category::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffPattern {
    OffByOne,
    OutputFormat,
    LogicError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestAnalysis {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub hidden_failed: bool,
    pub dominant_pattern: Option<DiffPattern>,
}

impl TestAnalysis {
    pub fn pass_ratio(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.passed as f64 / self.total as f64)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub severity: u8,
    pub signals: Vec<String>,
    pub matched_patterns: Vec<String>,
    pub suggested_focus: String,
    pub test_analysis: TestAnalysis,
}

// --- Mistakes ---

/// Learner-behavior taxonomy. Distinct from [`Category`], which describes
/// error mechanics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MistakeType {
    Careless,
    Misunderstanding,
    Syntax,
    TypeError,
    Timeout,
    Memory,
    EdgeCase,
    Logic,
    OffByOne,
    OutputFormat,
    NullReference,
    Incomplete,
    Other,
}

impl MistakeType {
    pub const ALL: [MistakeType; 13] = [
        MistakeType::Careless,
        MistakeType::Misunderstanding,
        MistakeType::Syntax,
        MistakeType::TypeError,
        MistakeType::Timeout,
        MistakeType::Memory,
        MistakeType::EdgeCase,
        MistakeType::Logic,
        MistakeType::OffByOne,
        MistakeType::OutputFormat,
        MistakeType::NullReference,
        MistakeType::Incomplete,
        MistakeType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MistakeType::Careless => "CARELESS",
            MistakeType::Misunderstanding => "MISUNDERSTANDING",
            MistakeType::Syntax => "SYNTAX",
            MistakeType::TypeError => "TYPE_ERROR",
            MistakeType::Timeout => "TIMEOUT",
            MistakeType::Memory => "MEMORY",
            MistakeType::EdgeCase => "EDGE_CASE",
            MistakeType::Logic => "LOGIC",
            MistakeType::OffByOne => "OFF_BY_ONE",
            MistakeType::OutputFormat => "OUTPUT_FORMAT",
            MistakeType::NullReference => "NULL_REFERENCE",
            MistakeType::Incomplete => "INCOMPLETE",
            MistakeType::Other => "OTHER",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MistakeType::Careless => "careless slip",
            MistakeType::Misunderstanding => "problem misunderstanding",
            MistakeType::Syntax => "syntax error",
            MistakeType::TypeError => "type error",
            MistakeType::Timeout => "too slow",
            MistakeType::Memory => "memory blow-up",
            MistakeType::EdgeCase => "missed edge case",
            MistakeType::Logic => "logic error",
            MistakeType::OffByOne => "off-by-one",
            MistakeType::OutputFormat => "output formatting",
            MistakeType::NullReference => "null reference",
            MistakeType::Incomplete => "incomplete solution",
            MistakeType::Other => "other",
        }
    }
}

impl FromStr for MistakeType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MistakeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown mistake type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillArea {
    Loops,
    Arrays,
    Strings,
    Conditionals,
    Methods,
    Classes,
    Recursion,
    Io,
}

impl SkillArea {
    pub const ALL: [SkillArea; 8] = [
        SkillArea::Loops,
        SkillArea::Arrays,
        SkillArea::Strings,
        SkillArea::Conditionals,
        SkillArea::Methods,
        SkillArea::Classes,
        SkillArea::Recursion,
        SkillArea::Io,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillArea::Loops => "LOOPS",
            SkillArea::Arrays => "ARRAYS",
            SkillArea::Strings => "STRINGS",
            SkillArea::Conditionals => "CONDITIONALS",
            SkillArea::Methods => "METHODS",
            SkillArea::Classes => "CLASSES",
            SkillArea::Recursion => "RECURSION",
            SkillArea::Io => "IO",
        }
    }
}

impl FromStr for SkillArea {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SkillArea::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown skill area: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Resolution {
    Unresolved,
    Resolved { resolved_at: i64, lesson: String },
}

impl Resolution {
    pub fn was_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MistakeLog {
    pub id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub attempt_id: i64,
    pub mistake_type: MistakeType,
    pub severity: u8,
    pub description: String,
    pub code_snippet: String,
    pub error_text: Option<String>,
    pub is_recurring: bool,
    pub topic_id: Option<i64>,
    pub skill_area: Option<SkillArea>,
    pub resolution: Resolution,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Worsening,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MistakeTrend {
    pub direction: TrendDirection,
    pub recent_count: i64,
    pub prior_count: i64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MistakePatterns {
    pub by_type: BTreeMap<MistakeType, i64>,
    pub by_skill_area: BTreeMap<SkillArea, i64>,
    pub unclassified_area: i64,
    pub recent_recurring: Vec<MistakeLog>,
    pub trend: MistakeTrend,
}

// --- History (inputs of full recompute) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: i64,
    pub user_id: i64,
    pub exercise_id: i64,
    pub topic_id: Option<i64>,
    pub difficulty: Difficulty,
    pub passed: bool,
    pub status: ExecutionStatus,
    pub duration_ms: u64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Attempt,
    Session,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Attempt => "attempt",
            ActivityKind::Session => "session",
        }
    }
}

impl FromStr for ActivityKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attempt" => Ok(ActivityKind::Attempt),
            "session" => Ok(ActivityKind::Session),
            other => Err(format!("unknown activity kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub user_id: i64,
    pub kind: ActivityKind,
    pub duration_secs: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileHistory {
    /// Most recent first.
    pub attempts: Vec<AttemptRecord>,
    pub mistakes: Vec<MistakeLog>,
    pub activity: Vec<ActivityEvent>,
    pub missions: Vec<Mission>,
}

// --- Cognitive Profile ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveProfile {
    pub user_id: i64,
    pub accuracy_rate: f64,
    pub retry_rate: f64,
    pub avg_solve_time_secs: f64,
    pub avg_solve_time_by_difficulty: BTreeMap<Difficulty, f64>,
    pub streak_stability: f64,
    pub momentum_score: f64,
    pub burnout_risk_score: f64,
    pub confidence_index: f64,
    pub engagement_score: f64,
    pub preferred_session_minutes: f64,
    pub peak_performance_hour: Option<u32>,
    pub consistency_score: f64,
    pub learning_velocity: f64,
    pub current_win_streak: i64,
    pub current_lose_streak: i64,
    pub practice_streak_days: i64,
    pub total_attempts: i64,
    pub total_passes: i64,
    pub total_mistakes: i64,
    pub topic_weakness_map: BTreeMap<i64, f64>,
    pub topic_strength_map: BTreeMap<i64, f64>,
    pub mistake_type_frequency: BTreeMap<MistakeType, i64>,
    pub version: i64,
    pub updated_at: i64,
}

impl CognitiveProfile {
    pub fn new(user_id: i64, now: i64) -> Self {
        CognitiveProfile {
            user_id,
            accuracy_rate: 0.0,
            retry_rate: 0.0,
            avg_solve_time_secs: 0.0,
            avg_solve_time_by_difficulty: BTreeMap::new(),
            streak_stability: crate::constants::STREAK_STABILITY_DEFAULT,
            momentum_score: crate::constants::MOMENTUM_DEFAULT,
            burnout_risk_score: 0.0,
            confidence_index: crate::constants::CONFIDENCE_DEFAULT,
            engagement_score: 0.0,
            preferred_session_minutes: crate::constants::PREFERRED_SESSION_DEFAULT_MINUTES,
            peak_performance_hour: None,
            consistency_score: 0.0,
            learning_velocity: 0.0,
            current_win_streak: 0,
            current_lose_streak: 0,
            practice_streak_days: 0,
            total_attempts: 0,
            total_passes: 0,
            total_mistakes: 0,
            topic_weakness_map: BTreeMap::new(),
            topic_strength_map: BTreeMap::new(),
            mistake_type_frequency: BTreeMap::new(),
            version: 0,
            updated_at: now,
        }
    }

    pub fn topic_strength(&self, topic_id: i64) -> f64 {
        self.topic_strength_map
            .get(&topic_id)
            .copied()
            .unwrap_or(crate::constants::TOPIC_NEUTRAL)
    }

    pub fn topic_weakness(&self, topic_id: i64) -> f64 {
        self.topic_weakness_map
            .get(&topic_id)
            .copied()
            .unwrap_or(crate::constants::TOPIC_NEUTRAL)
    }
}

// --- Missions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionType {
    BurnoutPrevention,
    StreakProtection,
    MistakeRecovery,
    WeaknessTraining,
    ConfidenceBoost,
    MomentumPush,
    SkillUnlock,
    ConsistencyBuilder,
    ReviewSession,
    SpeedChallenge,
    AccuracyFocus,
}

impl MissionType {
    pub const ALL: [MissionType; 11] = [
        MissionType::BurnoutPrevention,
        MissionType::StreakProtection,
        MissionType::MistakeRecovery,
        MissionType::WeaknessTraining,
        MissionType::ConfidenceBoost,
        MissionType::MomentumPush,
        MissionType::SkillUnlock,
        MissionType::ConsistencyBuilder,
        MissionType::ReviewSession,
        MissionType::SpeedChallenge,
        MissionType::AccuracyFocus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MissionType::BurnoutPrevention => "BURNOUT_PREVENTION",
            MissionType::StreakProtection => "STREAK_PROTECTION",
            MissionType::MistakeRecovery => "MISTAKE_RECOVERY",
            MissionType::WeaknessTraining => "WEAKNESS_TRAINING",
            MissionType::ConfidenceBoost => "CONFIDENCE_BOOST",
            MissionType::MomentumPush => "MOMENTUM_PUSH",
            MissionType::SkillUnlock => "SKILL_UNLOCK",
            MissionType::ConsistencyBuilder => "CONSISTENCY_BUILDER",
            MissionType::ReviewSession => "REVIEW_SESSION",
            MissionType::SpeedChallenge => "SPEED_CHALLENGE",
            MissionType::AccuracyFocus => "ACCURACY_FOCUS",
        }
    }
}

impl FromStr for MissionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MissionType::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown mission type: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionTemplate {
    pub mission_type: MissionType,
    pub title: String,
    pub description: String,
    pub target_value: u32,
    pub xp_reward: u32,
    pub difficulty: u8,
    pub priority: u32,
    pub target_topic: Option<i64>,
    pub target_skill_area: Option<SkillArea>,
    pub target_mistake_type: Option<MistakeType>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: i64,
    pub user_id: i64,
    pub template: MissionTemplate,
    pub scheduled_for: String,
    pub expires_at: i64,
    pub progress: u32,
    pub completed_at: Option<i64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillNodeProgress {
    pub node_id: i64,
    pub name: String,
    pub progress_pct: f64,
    pub completed: bool,
}

/// Everything the mission generator reads. Built once per request so the
/// generator itself stays a pure function.
#[derive(Debug, Clone)]
pub struct MissionSnapshot {
    pub profile: CognitiveProfile,
    pub recurring_by_type: Vec<(MistakeType, i64)>,
    pub skill_nodes: Vec<SkillNodeProgress>,
}

// --- Selection ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub exercise_id: i64,
    pub score: f64,
    pub pool_size: usize,
    pub reason: String,
}

// --- Pipeline ---

#[derive(Debug, Clone, Deserialize)]
pub struct AttemptSubmission {
    pub user_id: i64,
    pub attempt_id: i64,
    pub exercise_id: i64,
    pub result: ExecutionResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptOutcome {
    pub attempt_id: i64,
    pub duplicate: bool,
    pub classification: Classification,
    pub mistake: Option<MistakeLog>,
}
