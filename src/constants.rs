// src/constants.rs

// --- Time Constants ---
pub const DAY_SECONDS: i64 = 86400;
pub const HOUR_SECONDS: i64 = 3600;
pub const RECURRENCE_WINDOW_DAYS: i64 = 7;
pub const TREND_WINDOW_DAYS: i64 = 7;
pub const HISTORY_WINDOW_DAYS: i64 = 30;

// --- Classifier ---
pub const MAX_SOURCE_SCAN_CHARS: usize = 20_000;
pub const MAX_DIAGNOSTIC_SCAN_CHARS: usize = 4_000;
pub const MAX_ANALYZED_TESTS: usize = 100;
pub const MAX_COMPARE_CHARS: usize = 1_000;
pub const MAX_STATIC_RISK_SIGNALS: usize = 3;
pub const LOW_SIMILARITY_THRESHOLD: f64 = 0.3;
pub const HIGH_PASS_RATIO: f64 = 0.8;

pub const SEVERITY_MIN: u8 = 1;
pub const SEVERITY_MAX: u8 = 5;
pub const SEVERITY_TIMEOUT: u8 = 4;
pub const SEVERITY_SYNTAX: u8 = 2;
pub const SEVERITY_RUNTIME: u8 = 3;
pub const SEVERITY_OFF_BY_ONE: u8 = 2;
pub const SEVERITY_OUTPUT_FORMAT: u8 = 1;
pub const SEVERITY_LOGIC: u8 = 4;

// --- Mistake Store ---
pub const MISUNDERSTANDING_FAILURE_RATE: f64 = 0.7;
pub const CARELESS_SIMILARITY: f64 = 0.8;
pub const RECURRING_PRIOR_COUNT: i64 = 2;
pub const CODE_SNIPPET_MAX_CHARS: usize = 500;
pub const ERROR_TEXT_MAX_CHARS: usize = 300;
pub const RECENT_RECURRING_LIMIT: usize = 10;

// --- Cognitive Profile ---
pub const EMA_ALPHA: f64 = 0.3;
pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;
pub const TOPIC_NEUTRAL: f64 = 50.0;
pub const TOPIC_CONFIDENCE_ATTEMPTS: f64 = 10.0;

pub const CONFIDENCE_DEFAULT: f64 = 50.0;
pub const CONFIDENCE_GAIN_PASS: f64 = 2.0;
pub const CONFIDENCE_LOSS_FAIL: f64 = 5.0;
pub const MOMENTUM_DEFAULT: f64 = 50.0;
pub const MOMENTUM_GAIN_PASS: f64 = 3.0;
pub const MOMENTUM_LOSS_FAIL: f64 = 2.0;
pub const STREAK_STABILITY_DEFAULT: f64 = 50.0;
pub const PREFERRED_SESSION_DEFAULT_MINUTES: f64 = 30.0;

pub const RECOMPUTE_ATTEMPT_LIMIT: i64 = 500;
pub const MOMENTUM_WINDOW: usize = 10;
pub const STABILITY_WINDOW: usize = 50;
pub const PEAK_HOUR_MIN_ATTEMPTS: usize = 3;
pub const OVERLOAD_ATTEMPTS_PER_DAY: f64 = 30.0;
pub const LATE_NIGHT_END_HOUR: u32 = 5;
pub const PROFILE_WRITE_RETRIES: u32 = 5;

// Burnout contributions
pub const BURNOUT_OVERLOAD: f64 = 30.0;
pub const BURNOUT_LOW_MOMENTUM: f64 = 20.0;
pub const BURNOUT_LOSE_STREAK: f64 = 20.0;
pub const BURNOUT_LATE_NIGHT: f64 = 15.0;
pub const BURNOUT_MISSION_NEGLECT: f64 = 15.0;

// --- Mission Generator ---
pub const BURNOUT_THRESHOLD: f64 = 60.0;
pub const WEAKNESS_THRESHOLD: f64 = 50.0;
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 40.0;
pub const LOW_MOMENTUM_THRESHOLD: f64 = 40.0;
pub const LOW_CONSISTENCY_THRESHOLD: f64 = 30.0;
pub const CONSISTENCY_MIN_ATTEMPTS: i64 = 10;
pub const SPEED_CHALLENGE_ACCURACY: f64 = 0.7;
pub const ACCURACY_FOCUS_ACCURACY: f64 = 0.6;

pub const PRIORITY_BURNOUT_PREVENTION: u32 = 95;
pub const PRIORITY_STREAK_PROTECTION: u32 = 90;
pub const PRIORITY_MISTAKE_RECOVERY: u32 = 85;
pub const PRIORITY_WEAKNESS_TRAINING: u32 = 80;
pub const PRIORITY_CONFIDENCE_BOOST: u32 = 75;
pub const PRIORITY_MOMENTUM_PUSH: u32 = 70;
pub const PRIORITY_SKILL_UNLOCK: u32 = 65;
pub const PRIORITY_CONSISTENCY_BUILDER: u32 = 60;
pub const PRIORITY_REVIEW_SESSION: u32 = 50;
pub const PRIORITY_SPEED_CHALLENGE: u32 = 45;
pub const PRIORITY_ACCURACY_FOCUS: u32 = 40;

pub const STREAK_XP_BASE: u32 = 50;
pub const STREAK_XP_PER_DAY: u32 = 10;
pub const STREAK_XP_CAP: u32 = 200;

// --- Adaptive Selector / Skill Tree ---
pub const TOPIC_UNLOCK_THRESHOLD: f64 = 70.0;
pub const FIT_MAX_SCORE: f64 = 40.0;
pub const FIT_PENALTY_PER_LEVEL: f64 = 15.0;
pub const WEAKNESS_MAX_SCORE: f64 = 30.0;
pub const STREAK_BONUS: f64 = 10.0;
pub const WIN_STREAK_FOR_STRETCH: i64 = 3;
pub const LOSE_STREAK_FOR_REBUILD: i64 = 2;
pub const RECENT_FAILURE_PENALTY: f64 = 25.0;
pub const RECENT_FAILURE_WINDOW_SECONDS: i64 = HOUR_SECONDS;
pub const JITTER_MAX: f64 = 20.0;
