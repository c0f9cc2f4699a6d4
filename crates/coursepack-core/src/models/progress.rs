use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::LazyLock;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Zero duration in `HHHH:MM:SS.ss` form.
pub const DEFAULT_TOTAL_TIME: &str = "0000:00:00.00";

static TOTAL_TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2,4}):([0-5]\d):([0-5]\d)(\.\d{1,2})?$").expect("valid total time regex")
});

/// Completion state reported by course content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum LessonStatus {
    #[default]
    #[serde(
        rename = "not attempted",
        alias = "not-attempted",
        alias = "not_attempted"
    )]
    NotAttempted,
    #[serde(rename = "incomplete")]
    Incomplete,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "passed")]
    Passed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "browsed")]
    Browsed,
}

impl LessonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonStatus::NotAttempted => "not attempted",
            LessonStatus::Incomplete => "incomplete",
            LessonStatus::Completed => "completed",
            LessonStatus::Passed => "passed",
            LessonStatus::Failed => "failed",
            LessonStatus::Browsed => "browsed",
        }
    }
}

impl FromStr for LessonStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "not attempted" | "not-attempted" | "not_attempted" => Ok(LessonStatus::NotAttempted),
            "incomplete" => Ok(LessonStatus::Incomplete),
            "completed" => Ok(LessonStatus::Completed),
            "passed" => Ok(LessonStatus::Passed),
            "failed" => Ok(LessonStatus::Failed),
            "browsed" => Ok(LessonStatus::Browsed),
            _ => Err(anyhow::anyhow!("Invalid lesson status: {}", s)),
        }
    }
}

impl Display for LessonStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Durable state of one learner's interaction with one package.
///
/// At most one record exists per (`learner_id`, `package_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub id: Uuid,
    pub learner_id: String,
    pub package_id: Uuid,
    pub lesson_status: LessonStatus,
    pub location: String,
    pub score: f64,
    pub total_time: String,
    pub suspend_data: String,
    pub last_accessed: DateTime<Utc>,
}

impl ProgressRecord {
    /// A fresh record with every field at its documented default.
    pub fn new(learner_id: impl Into<String>, package_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id: learner_id.into(),
            package_id,
            lesson_status: LessonStatus::default(),
            location: String::new(),
            score: 0.0,
            total_time: DEFAULT_TOTAL_TIME.to_string(),
            suspend_data: String::new(),
            last_accessed: Utc::now(),
        }
    }

    /// Field-level merge: every supplied field overwrites, absent fields keep their value.
    ///
    /// Explicit empty strings and `0` count as supplied.
    pub fn apply(&mut self, update: &ProgressUpdate, now: DateTime<Utc>) {
        if let Some(status) = update.lesson_status {
            self.lesson_status = status;
        }
        if let Some(location) = &update.location {
            self.location = location.clone();
        }
        if let Some(score) = update.score {
            self.score = score;
        }
        if let Some(total_time) = &update.total_time {
            self.total_time = total_time.clone();
        }
        if let Some(suspend_data) = &update.suspend_data {
            self.suspend_data = suspend_data.clone();
        }
        self.last_accessed = now;
    }
}

/// Partial progress fields supplied by a save call.
///
/// `None` means "not supplied"; `Some("")` and `Some(0.0)` are real values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    #[serde(default)]
    pub lesson_status: Option<LessonStatus>,
    #[serde(default)]
    #[validate(custom(function = "validate_no_nul"))]
    pub location: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0, message = "Score must be between 0 and 100"))]
    pub score: Option<f64>,
    #[serde(default)]
    #[validate(custom(function = "validate_total_time"))]
    pub total_time: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_no_nul"))]
    pub suspend_data: Option<String>,
}

impl ProgressUpdate {
    pub fn is_empty(&self) -> bool {
        self.lesson_status.is_none()
            && self.location.is_none()
            && self.score.is_none()
            && self.total_time.is_none()
            && self.suspend_data.is_none()
    }
}

/// Check a `HHHH:MM:SS.ss` timespan (2-4 hour digits, optional 1-2 fractional digits).
pub fn validate_total_time(value: &str) -> Result<(), ValidationError> {
    if TOTAL_TIME_PATTERN.is_match(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("total_time_format");
        err.message = Some("Total time must use the HHHH:MM:SS.ss format".into());
        Err(err)
    }
}

/// Text columns cannot hold NUL; reject it up front for every backend.
pub fn validate_no_nul(value: &str) -> Result<(), ValidationError> {
    if value.contains('\0') {
        let mut err = ValidationError::new("nul_character");
        err.message = Some("Value must not contain NUL characters".into());
        Err(err)
    } else {
        Ok(())
    }
}
