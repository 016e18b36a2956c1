use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }
}

/// Identifies one lesson record of one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LessonKey {
    pub user_id: String,
    pub course_id: String,
    pub lesson_id: String,
}

impl LessonKey {
    pub fn new(user_id: &str, course_id: &str, lesson_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            lesson_id: lesson_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub user_id: String,
    pub course_id: String,
    pub lesson_id: String,
    pub status: ProgressStatus,
    pub current_streak: u32,
    pub max_streak: u32,
    pub lesson_points: i64,
    pub started_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    pub fn new(key: &LessonKey, now: DateTime<Utc>) -> Self {
        Self {
            user_id: key.user_id.clone(),
            course_id: key.course_id.clone(),
            lesson_id: key.lesson_id.clone(),
            status: ProgressStatus::NotStarted,
            current_streak: 0,
            max_streak: 0,
            lesson_points: 0,
            started_at: now,
            last_accessed_at: now,
            completed_at: None,
        }
    }

    pub fn key(&self) -> LessonKey {
        LessonKey::new(&self.user_id, &self.course_id, &self.lesson_id)
    }

    /// Moves to `status`, stamping `completed_at` on the first completion only.
    pub fn set_status(&mut self, status: ProgressStatus, now: DateTime<Utc>) {
        mark_status(&mut self.status, &mut self.completed_at, status, now);
        self.last_accessed_at = now;
    }

    /// An attempt starts a lesson but never reopens a completed one.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if self.status == ProgressStatus::NotStarted {
            self.status = ProgressStatus::InProgress;
        }
        self.last_accessed_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub user_id: String,
    pub course_id: String,
    pub status: ProgressStatus,
    pub course_points: i64,
    pub started_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CourseProgress {
    pub fn new(user_id: &str, course_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            status: ProgressStatus::NotStarted,
            course_points: 0,
            started_at: now,
            last_accessed_at: now,
            completed_at: None,
        }
    }

    pub fn set_status(&mut self, status: ProgressStatus, now: DateTime<Utc>) {
        mark_status(&mut self.status, &mut self.completed_at, status, now);
        self.last_accessed_at = now;
    }
}

fn mark_status(
    current: &mut ProgressStatus,
    completed_at: &mut Option<DateTime<Utc>>,
    next: ProgressStatus,
    now: DateTime<Utc>,
) {
    if next == ProgressStatus::Completed && completed_at.is_none() {
        *completed_at = Some(now);
    }
    *current = next;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressWithPercentage {
    #[serde(flatten)]
    pub progress: CourseProgress,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseAttempt {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub lesson_id: String,
    pub exercise_id: String,
    pub attempt_number: u32,
    pub answer: Value,
    pub is_correct: bool,
    pub points_earned: i32,
    pub streak_at_attempt: u32,
    pub attempted_at: DateTime<Utc>,
}

impl ExerciseAttempt {
    pub fn new(key: &LessonKey, exercise_id: &str, answer: Value, is_correct: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: key.user_id.clone(),
            course_id: key.course_id.clone(),
            lesson_id: key.lesson_id.clone(),
            exercise_id: exercise_id.to_string(),
            attempt_number: 0,
            answer,
            is_correct,
            points_earned: 0,
            streak_at_attempt: 0,
            attempted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProgressRequest {
    pub status: ProgressStatus,
}
