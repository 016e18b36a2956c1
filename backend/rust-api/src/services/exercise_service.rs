use serde_json::Value;
use std::sync::Arc;

use crate::config::PointsConfig;
use crate::errors::{AttemptError, StoreError};
use crate::metrics::ANSWERS_SUBMITTED_TOTAL;
use crate::models::answer::{ExerciseAttemptResponse, SubmittedAnswer};
use crate::models::points::PointTransaction;
use crate::models::progress::{ExerciseAttempt, LessonKey, LessonProgress};
use crate::services::answer_verifier::verify;
use crate::services::content_service::ContentStore;
use crate::services::points_service::{apply_answer, log_answer};
use crate::services::progress_service::append_attempt;
use crate::services::streak_service::record_accuracy;
use crate::store::{in_unit_of_work, Store, UnitOfWork};

/// Runs one exercise attempt end to end.
pub struct ExerciseService {
    content: Arc<ContentStore>,
    store: Arc<dyn Store>,
    config: PointsConfig,
}

struct AttemptOutcome {
    transaction: Option<PointTransaction>,
    progress: LessonProgress,
    attempt: ExerciseAttempt,
}

impl ExerciseService {
    pub fn new(content: Arc<ContentStore>, store: Arc<dyn Store>, config: PointsConfig) -> Self {
        Self {
            content,
            store,
            config,
        }
    }

    /// Verifies `answer`, then awards points, logs the attempt and counts it
    /// towards accuracy in a single unit of work.
    ///
    /// Malformed answers fail before anything is written.
    pub async fn submit_attempt(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
        exercise_id: &str,
        answer: Value,
    ) -> Result<ExerciseAttemptResponse, AttemptError> {
        let exercise = self
            .content
            .get_exercise(course_id, lesson_id, exercise_id)?;

        let submitted = SubmittedAnswer::parse(exercise.kind(), &answer).inspect_err(|e| {
            tracing::warn!(user_id, exercise_id, error = %e, "Rejected answer");
        })?;
        let is_correct = verify(exercise, &submitted)?;
        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[if is_correct { "true" } else { "false" }])
            .inc();

        let key = LessonKey::new(user_id, course_id, lesson_id);
        let exercise_id_owned = exercise_id.to_string();
        let config = self.config.clone();
        let outcome = in_unit_of_work(self.store.as_ref(), "submit_attempt", move |uow| {
            Box::pin(record_attempt(
                uow,
                key,
                exercise_id_owned,
                answer,
                is_correct,
                config,
            ))
        })
        .await?;

        log_answer(user_id, course_id, lesson_id, outcome.transaction.as_ref());
        tracing::info!(
            user_id,
            course_id,
            lesson_id,
            exercise_id,
            is_correct,
            attempt = outcome.attempt.attempt_number,
            "Exercise attempt recorded"
        );

        Ok(ExerciseAttemptResponse {
            is_correct,
            points: outcome.attempt.points_earned,
            transaction: outcome.transaction,
            current_streak: outcome.progress.current_streak,
            max_streak: outcome.progress.max_streak,
            attempt_number: outcome.attempt.attempt_number,
        })
    }
}

async fn record_attempt(
    uow: &mut dyn UnitOfWork,
    key: LessonKey,
    exercise_id: String,
    answer: Value,
    is_correct: bool,
    config: PointsConfig,
) -> Result<AttemptOutcome, StoreError> {
    let award = apply_answer(uow, key.clone(), exercise_id.clone(), is_correct, config).await?;

    let mut attempt = ExerciseAttempt::new(&key, &exercise_id, answer, is_correct);
    attempt.points_earned = award.transaction.as_ref().map_or(0, |t| t.points);
    attempt.streak_at_attempt = award.progress.current_streak;
    let attempt = append_attempt(uow, attempt).await?;

    record_accuracy(uow, &key.user_id, is_correct).await?;

    Ok(AttemptOutcome {
        transaction: award.transaction,
        progress: award.progress,
        attempt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ContentError, VerifyError};
    use crate::models::content::{AnswerKey, Course, Exercise, Lesson};
    use crate::store::test_support::FailingStore;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn content() -> Arc<ContentStore> {
        let lesson = Lesson {
            lesson_id: "ownership".to_string(),
            title: "Ownership".to_string(),
            description: String::new(),
            exercises: vec![Exercise {
                id: "pick".to_string(),
                prompt: "Which keyword moves?".to_string(),
                choices: vec!["let".to_string(), "move".to_string()],
                items: Vec::new(),
                key: AnswerKey::MultipleChoice { correct_index: 1 },
            }],
        };
        Arc::new(ContentStore::new(vec![Course {
            id: "rust".to_string(),
            name: "Rust".to_string(),
            description: String::new(),
            lessons: vec![lesson],
        }]))
    }

    fn service() -> (ExerciseService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            ExerciseService::new(content(), store.clone(), PointsConfig::default()),
            store,
        )
    }

    #[tokio::test]
    async fn correct_attempt_awards_and_counts() {
        let (exercises, store) = service();

        let response = exercises
            .submit_attempt("alice", "rust", "ownership", "pick", json!(1))
            .await
            .unwrap();

        assert!(response.is_correct);
        assert_eq!(response.points, 10);
        assert_eq!(response.current_streak, 1);
        assert_eq!(response.attempt_number, 1);
        let user = store.get_user("alice").await.unwrap().unwrap();
        assert_eq!(user.total_attempts, 1);
        assert_eq!(user.correct_attempts, 1);
        assert_eq!(user.total_points, 10);
    }

    #[tokio::test]
    async fn wrong_attempt_resets_streak() {
        let (exercises, _) = service();
        exercises
            .submit_attempt("alice", "rust", "ownership", "pick", json!(1))
            .await
            .unwrap();

        let response = exercises
            .submit_attempt("alice", "rust", "ownership", "pick", json!(0))
            .await
            .unwrap();

        assert!(!response.is_correct);
        assert!(response.transaction.is_none());
        assert_eq!(response.current_streak, 0);
        assert_eq!(response.max_streak, 1);
        assert_eq!(response.attempt_number, 2);
    }

    #[tokio::test]
    async fn malformed_answer_writes_nothing() {
        let (exercises, store) = service();

        let err = exercises
            .submit_attempt("alice", "rust", "ownership", "pick", json!("one"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AttemptError::Verify(VerifyError::InvalidAnswerFormat { .. })
        ));
        assert!(store.get_user("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_exercise_is_not_found() {
        let (exercises, _) = service();

        let err = exercises
            .submit_attempt("alice", "rust", "ownership", "missing", json!(1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AttemptError::Content(ContentError::NotFound { entity: "exercise", .. })
        ));
    }

    #[tokio::test]
    async fn failed_attempt_log_rolls_back_the_award() {
        let inner = MemoryStore::new();
        ExerciseService::new(content(), Arc::new(inner.clone()), PointsConfig::default())
            .submit_attempt("alice", "rust", "ownership", "pick", json!(1))
            .await
            .unwrap();
        let failing = ExerciseService::new(
            content(),
            Arc::new(FailingStore::attempts(inner.clone())),
            PointsConfig::default(),
        );

        let err = failing
            .submit_attempt("alice", "rust", "ownership", "pick", json!(1))
            .await
            .unwrap_err();

        assert!(matches!(err, AttemptError::Store(_)));
        let user = inner.get_user("alice").await.unwrap().unwrap();
        assert_eq!(user.total_points, 10);
        assert_eq!(user.total_attempts, 1);
        assert_eq!(user.correct_attempts, 1);
        assert_eq!(inner.recent_transactions("alice", 10).await.unwrap().len(), 1);
        let key = LessonKey::new("alice", "rust", "ownership");
        let lesson = inner.get_lesson_progress(&key).await.unwrap().unwrap();
        assert_eq!(lesson.current_streak, 1);
        assert_eq!(lesson.lesson_points, 10);
    }
}
