use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use crate::errors::StoreError;
use crate::models::progress::{
    CourseProgress, CourseProgressWithPercentage, ExerciseAttempt, LessonKey, LessonProgress,
    ProgressStatus,
};
use crate::store::{in_unit_of_work, Store, UnitOfWork};

pub struct ProgressService {
    store: Arc<dyn Store>,
}

impl ProgressService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get_or_create_course_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<CourseProgress, StoreError> {
        if let Some(existing) = self.store.get_course_progress(user_id, course_id).await? {
            return Ok(existing);
        }

        let user = user_id.to_string();
        let course = course_id.to_string();
        in_unit_of_work(self.store.as_ref(), "create_course_progress", move |uow| {
            Box::pin(async move {
                if let Some(existing) = uow.course_progress_for_update(&user, &course).await? {
                    return Ok(existing);
                }
                let progress = CourseProgress::new(&user, &course, Utc::now());
                uow.save_course_progress(&progress).await?;
                Ok::<_, StoreError>(progress)
            })
        })
        .await
    }

    pub async fn get_or_create_lesson_progress(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<LessonProgress, StoreError> {
        let key = LessonKey::new(user_id, course_id, lesson_id);
        if let Some(existing) = self.store.get_lesson_progress(&key).await? {
            return Ok(existing);
        }

        in_unit_of_work(self.store.as_ref(), "create_lesson_progress", move |uow| {
            Box::pin(async move {
                if let Some(existing) = uow.lesson_progress_for_update(&key).await? {
                    return Ok(existing);
                }
                let progress = LessonProgress::new(&key, Utc::now());
                uow.save_lesson_progress(&progress).await?;
                Ok::<_, StoreError>(progress)
            })
        })
        .await
    }

    pub async fn update_lesson_progress(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
        status: ProgressStatus,
    ) -> Result<LessonProgress, StoreError> {
        let key = LessonKey::new(user_id, course_id, lesson_id);
        let progress = in_unit_of_work(self.store.as_ref(), "update_lesson_progress", move |uow| {
            Box::pin(async move {
                let now = Utc::now();
                let mut progress = uow
                    .lesson_progress_for_update(&key)
                    .await?
                    .unwrap_or_else(|| LessonProgress::new(&key, now));
                progress.set_status(status, now);
                uow.save_lesson_progress(&progress).await?;
                Ok::<_, StoreError>(progress)
            })
        })
        .await?;

        tracing::info!(
            user_id,
            course_id,
            lesson_id,
            status = status.as_str(),
            "Lesson progress updated"
        );
        Ok(progress)
    }

    pub async fn update_course_progress(
        &self,
        user_id: &str,
        course_id: &str,
        status: ProgressStatus,
    ) -> Result<CourseProgress, StoreError> {
        let user = user_id.to_string();
        let course = course_id.to_string();
        let progress = in_unit_of_work(self.store.as_ref(), "update_course_progress", move |uow| {
            Box::pin(async move {
                let now = Utc::now();
                let mut progress = uow
                    .course_progress_for_update(&user, &course)
                    .await?
                    .unwrap_or_else(|| CourseProgress::new(&user, &course, now));
                progress.set_status(status, now);
                uow.save_course_progress(&progress).await?;
                Ok::<_, StoreError>(progress)
            })
        })
        .await?;

        tracing::info!(
            user_id,
            course_id,
            status = status.as_str(),
            "Course progress updated"
        );
        Ok(progress)
    }

    /// Course record plus the share of its `total_lessons` the user completed.
    pub async fn get_course_progress_with_percentage(
        &self,
        user_id: &str,
        course_id: &str,
        total_lessons: usize,
    ) -> Result<CourseProgressWithPercentage, StoreError> {
        let progress = self
            .get_or_create_course_progress(user_id, course_id)
            .await?;
        let completed_lessons = self
            .store
            .list_lesson_progress(user_id, Some(course_id))
            .await?
            .iter()
            .filter(|l| l.status == ProgressStatus::Completed)
            .count();

        let progress_percentage = if total_lessons == 0 {
            0.0
        } else {
            completed_lessons as f64 / total_lessons as f64 * 100.0
        };

        Ok(CourseProgressWithPercentage {
            progress,
            completed_lessons,
            total_lessons,
            progress_percentage,
        })
    }

    /// Appends an attempt numbered after the user's previous attempts on the
    /// same exercise.
    pub async fn record_exercise_attempt(
        &self,
        key: &LessonKey,
        exercise_id: &str,
        answer: Value,
        is_correct: bool,
        points_earned: i32,
        streak_at_attempt: u32,
    ) -> Result<ExerciseAttempt, StoreError> {
        let mut attempt = ExerciseAttempt::new(key, exercise_id, answer, is_correct);
        attempt.points_earned = points_earned;
        attempt.streak_at_attempt = streak_at_attempt;

        in_unit_of_work(self.store.as_ref(), "record_exercise_attempt", move |uow| {
            Box::pin(append_attempt(uow, attempt))
        })
        .await
    }
}

/// Numbers `attempt` after the ones already logged for its exercise and appends it.
pub(crate) async fn append_attempt(
    uow: &mut dyn UnitOfWork,
    mut attempt: ExerciseAttempt,
) -> Result<ExerciseAttempt, StoreError> {
    let key = LessonKey::new(&attempt.user_id, &attempt.course_id, &attempt.lesson_id);
    let previous = uow.count_attempts(&key, &attempt.exercise_id).await?;
    attempt.attempt_number = previous + 1;
    uow.insert_attempt(&attempt).await?;
    Ok(attempt)
}
