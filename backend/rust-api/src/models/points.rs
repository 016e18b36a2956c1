use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    CorrectAnswer,
    LessonCompleted,
    CourseCompleted,
    DailyStreakBonus,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::CorrectAnswer => "correct_answer",
            TransactionType::LessonCompleted => "lesson_completed",
            TransactionType::CourseCompleted => "course_completed",
            TransactionType::DailyStreakBonus => "daily_streak_bonus",
        }
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointTransaction {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise_id: Option<String>,
    pub transaction_type: TransactionType,
    pub points: i32,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl PointTransaction {
    pub fn new(
        user_id: &str,
        transaction_type: TransactionType,
        points: i32,
        description: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            course_id: None,
            lesson_id: None,
            exercise_id: None,
            transaction_type,
            points,
            description,
            created_at: Utc::now(),
        }
    }

    pub fn for_course(mut self, course_id: &str) -> Self {
        self.course_id = Some(course_id.to_string());
        self
    }

    pub fn for_lesson(mut self, lesson_id: &str) -> Self {
        self.lesson_id = Some(lesson_id.to_string());
        self
    }

    pub fn for_exercise(mut self, exercise_id: &str) -> Self {
        self.exercise_id = Some(exercise_id.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPoints {
    pub user_id: String,
    pub total_points: i64,
    pub current_streak: u32,
    pub max_streak: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPoints {
    pub user_id: String,
    pub course_id: String,
    pub lesson_id: String,
    pub total_points: i64,
    pub current_streak: u32,
    pub max_streak: u32,
    pub last_attempt_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsSummary {
    pub total_points: i64,
    pub current_streak: u32,
    pub max_streak: u32,
    pub recent_transactions: Vec<PointTransaction>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub total_points: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStreakInfo {
    pub user_id: String,
    pub current_streak: u32,
    pub max_streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_milestone: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_to_milestone: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyStats {
    pub user_id: String,
    pub total_attempts: u32,
    pub correct_attempts: u32,
    /// Percentage in `0.0..=100.0`.
    pub accuracy_rate: f64,
}

/// Result of an idempotent award; `transaction` is `null` when nothing was paid.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardResponse {
    pub awarded: bool,
    pub transaction: Option<PointTransaction>,
}

impl From<Option<PointTransaction>> for AwardResponse {
    fn from(transaction: Option<PointTransaction>) -> Self {
        Self {
            awarded: transaction.is_some(),
            transaction,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub transaction: Option<PointTransaction>,
    pub streak: DailyStreakInfo,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LimitQuery {
    #[validate(range(max = 100))]
    pub limit: Option<i64>,
}
