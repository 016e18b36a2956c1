//! Per-lesson answer streaks, completion bonuses and the point ledger.
//!
//! Every award updates the progress record, the user aggregate and the ledger
//! inside one unit of work, so `total_points` always matches the sum of the
//! user's transactions.

use chrono::Utc;
use std::sync::Arc;

use crate::config::PointsConfig;
use crate::errors::StoreError;
use crate::metrics;
use crate::models::points::{
    LeaderboardEntry, LessonPoints, PointTransaction, PointsSummary, TransactionType, UserPoints,
};
use crate::models::progress::{CourseProgress, LessonKey, LessonProgress, ProgressStatus};
use crate::store::{in_unit_of_work, Store, UnitOfWork};

const DEFAULT_LIMIT: usize = 10;

/// Extra points for the `new_streak`-th consecutive correct answer.
pub fn streak_bonus(new_streak: u32, config: &PointsConfig) -> i32 {
    if new_streak <= 1 {
        return 0;
    }
    let bonus = (i64::from(new_streak) * i64::from(config.streak_bonus_multiplier))
        .min(i64::from(config.max_streak_bonus));
    i32::try_from(bonus).unwrap_or(config.max_streak_bonus)
}

/// Non-positive or missing limits fall back to the default page size.
pub fn effective_limit(limit: Option<i64>) -> usize {
    match limit {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(DEFAULT_LIMIT),
        _ => DEFAULT_LIMIT,
    }
}

fn answer_description(base: i32, bonus: i32, streak: u32) -> String {
    let mut description = format!("Correct answer (+{base} points)");
    if bonus > 0 {
        description.push_str(&format!(
            " with streak bonus of {streak} consecutive correct answers (+{bonus} points)"
        ));
    }
    description
}

pub struct PointsService {
    store: Arc<dyn Store>,
    config: PointsConfig,
}

impl PointsService {
    pub fn new(store: Arc<dyn Store>, config: PointsConfig) -> Self {
        Self { store, config }
    }

    /// Applies one verified answer to the lesson streak.
    ///
    /// A correct answer returns the `correct_answer` transaction it appended;
    /// an incorrect one resets the streak and returns `None`.
    pub async fn award_for_answer(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
        exercise_id: &str,
        is_correct: bool,
    ) -> Result<Option<PointTransaction>, StoreError> {
        let key = LessonKey::new(user_id, course_id, lesson_id);
        let exercise_id = exercise_id.to_string();
        let config = self.config.clone();

        let outcome = in_unit_of_work(self.store.as_ref(), "award_for_answer", move |uow| {
            Box::pin(apply_answer(uow, key, exercise_id, is_correct, config))
        })
        .await?;

        log_answer(user_id, course_id, lesson_id, outcome.transaction.as_ref());
        Ok(outcome.transaction)
    }

    /// Pays the lesson completion bonus once and marks the lesson completed.
    pub async fn award_lesson_completion_bonus(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Option<PointTransaction>, StoreError> {
        let key = LessonKey::new(user_id, course_id, lesson_id);
        let bonus = self.config.lesson_completion_bonus;

        let transaction = in_unit_of_work(
            self.store.as_ref(),
            "award_lesson_completion_bonus",
            move |uow| Box::pin(complete_lesson(uow, key, bonus)),
        )
        .await?;

        self.log_bonus(user_id, course_id, transaction.as_ref());
        Ok(transaction)
    }

    /// Pays the course completion bonus once and marks the course completed.
    pub async fn award_course_completion_bonus(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<PointTransaction>, StoreError> {
        let user = user_id.to_string();
        let course = course_id.to_string();
        let bonus = self.config.course_completion_bonus;

        let transaction = in_unit_of_work(
            self.store.as_ref(),
            "award_course_completion_bonus",
            move |uow| Box::pin(complete_course(uow, user, course, bonus)),
        )
        .await?;

        self.log_bonus(user_id, course_id, transaction.as_ref());
        Ok(transaction)
    }

    pub async fn reset_lesson_streak(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<(), StoreError> {
        let key = LessonKey::new(user_id, course_id, lesson_id);
        in_unit_of_work(self.store.as_ref(), "reset_lesson_streak", move |uow| {
            Box::pin(async move {
                if let Some(mut progress) = uow.lesson_progress_for_update(&key).await? {
                    progress.current_streak = 0;
                    progress.last_accessed_at = Utc::now();
                    uow.save_lesson_progress(&progress).await?;
                }
                Ok::<_, StoreError>(())
            })
        })
        .await
    }

    /// Total points plus the best current and maximum lesson streaks.
    pub async fn get_user_total_points(&self, user_id: &str) -> Result<UserPoints, StoreError> {
        let user = self.store.get_user(user_id).await?;
        let lessons = self.store.list_lesson_progress(user_id, None).await?;

        Ok(UserPoints {
            user_id: user_id.to_string(),
            total_points: user.as_ref().map_or(0, |u| u.total_points),
            current_streak: lessons.iter().map(|l| l.current_streak).max().unwrap_or(0),
            max_streak: lessons.iter().map(|l| l.max_streak).max().unwrap_or(0),
            updated_at: user.and_then(|u| u.updated_at),
        })
    }

    pub async fn get_lesson_points(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<LessonPoints, StoreError> {
        let key = LessonKey::new(user_id, course_id, lesson_id);
        let progress = self.store.get_lesson_progress(&key).await?;

        Ok(match progress {
            Some(p) => LessonPoints {
                user_id: p.user_id,
                course_id: p.course_id,
                lesson_id: p.lesson_id,
                total_points: p.lesson_points,
                current_streak: p.current_streak,
                max_streak: p.max_streak,
                last_attempt_at: p.last_accessed_at,
            },
            None => LessonPoints {
                user_id: key.user_id,
                course_id: key.course_id,
                lesson_id: key.lesson_id,
                total_points: 0,
                current_streak: 0,
                max_streak: 0,
                last_attempt_at: Utc::now(),
            },
        })
    }

    pub async fn get_recent_transactions(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<PointTransaction>, StoreError> {
        self.store
            .recent_transactions(user_id, effective_limit(limit))
            .await
    }

    pub async fn get_points_summary(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> Result<PointsSummary, StoreError> {
        let totals = self.get_user_total_points(user_id).await?;
        let recent_transactions = self.get_recent_transactions(user_id, limit).await?;

        Ok(PointsSummary {
            total_points: totals.total_points,
            current_streak: totals.current_streak,
            max_streak: totals.max_streak,
            recent_transactions,
        })
    }

    pub async fn get_leaderboard(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let users = self.store.top_users(effective_limit(limit)).await?;
        Ok(users
            .into_iter()
            .zip(1u32..)
            .map(|(user, rank)| LeaderboardEntry {
                rank,
                user_id: user.user_id,
                total_points: user.total_points,
            })
            .collect())
    }

    fn log_bonus(&self, user_id: &str, course_id: &str, transaction: Option<&PointTransaction>) {
        match transaction {
            Some(t) => {
                metrics::record_points(t.transaction_type.as_str(), t.points);
                tracing::info!(
                    user_id,
                    course_id,
                    kind = t.transaction_type.as_str(),
                    points = t.points,
                    "Awarded completion bonus"
                );
            }
            None => tracing::debug!(user_id, course_id, "Completion bonus already awarded"),
        }
    }
}

/// Lesson record and ledger entry left behind by one answer.
pub(crate) struct AnswerOutcome {
    pub transaction: Option<PointTransaction>,
    pub progress: LessonProgress,
}

/// Metrics and log line for a committed answer.
pub(crate) fn log_answer(
    user_id: &str,
    course_id: &str,
    lesson_id: &str,
    transaction: Option<&PointTransaction>,
) {
    match transaction {
        Some(t) => {
            metrics::record_points(t.transaction_type.as_str(), t.points);
            tracing::info!(
                user_id,
                course_id,
                lesson_id,
                points = t.points,
                "Awarded points for correct answer"
            );
        }
        None => tracing::debug!(user_id, course_id, lesson_id, "Lesson streak reset"),
    }
}

pub(crate) async fn apply_answer(
    uow: &mut dyn UnitOfWork,
    key: LessonKey,
    exercise_id: String,
    is_correct: bool,
    config: PointsConfig,
) -> Result<AnswerOutcome, StoreError> {
    let now = Utc::now();
    let mut progress = uow
        .lesson_progress_for_update(&key)
        .await?
        .unwrap_or_else(|| LessonProgress::new(&key, now));

    if !is_correct {
        progress.current_streak = 0;
        progress.last_accessed_at = now;
        uow.save_lesson_progress(&progress).await?;
        return Ok(AnswerOutcome {
            transaction: None,
            progress,
        });
    }

    let new_streak = progress.current_streak + 1;
    let bonus = streak_bonus(new_streak, &config);
    let total = config.correct_answer_points + bonus;

    progress.current_streak = new_streak;
    progress.max_streak = progress.max_streak.max(new_streak);
    progress.lesson_points += i64::from(total);
    progress.touch(now);
    uow.save_lesson_progress(&progress).await?;

    let mut user = uow.user_for_update(&key.user_id).await?;
    user.credit(total, now);
    uow.save_user(&user).await?;

    let transaction = PointTransaction::new(
        &key.user_id,
        TransactionType::CorrectAnswer,
        total,
        answer_description(config.correct_answer_points, bonus, new_streak),
    )
    .for_course(&key.course_id)
    .for_lesson(&key.lesson_id)
    .for_exercise(&exercise_id);
    uow.insert_transaction(&transaction).await?;

    Ok(AnswerOutcome {
        transaction: Some(transaction),
        progress,
    })
}

async fn complete_lesson(
    uow: &mut dyn UnitOfWork,
    key: LessonKey,
    bonus: i32,
) -> Result<Option<PointTransaction>, StoreError> {
    let now = Utc::now();
    let mut progress = uow
        .lesson_progress_for_update(&key)
        .await?
        .unwrap_or_else(|| LessonProgress::new(&key, now));
    let already_paid = uow
        .has_transaction(
            &key.user_id,
            &key.course_id,
            Some(&key.lesson_id),
            TransactionType::LessonCompleted,
        )
        .await?;

    if already_paid {
        if progress.status != ProgressStatus::Completed {
            progress.set_status(ProgressStatus::Completed, now);
            uow.save_lesson_progress(&progress).await?;
        }
        return Ok(None);
    }

    progress.lesson_points += i64::from(bonus);
    progress.set_status(ProgressStatus::Completed, now);
    uow.save_lesson_progress(&progress).await?;

    let mut user = uow.user_for_update(&key.user_id).await?;
    user.credit(bonus, now);
    uow.save_user(&user).await?;

    let transaction = PointTransaction::new(
        &key.user_id,
        TransactionType::LessonCompleted,
        bonus,
        format!("Lesson completion bonus (+{bonus} points)"),
    )
    .for_course(&key.course_id)
    .for_lesson(&key.lesson_id);
    uow.insert_transaction(&transaction).await?;

    Ok(Some(transaction))
}

async fn complete_course(
    uow: &mut dyn UnitOfWork,
    user_id: String,
    course_id: String,
    bonus: i32,
) -> Result<Option<PointTransaction>, StoreError> {
    let now = Utc::now();
    let mut progress = uow
        .course_progress_for_update(&user_id, &course_id)
        .await?
        .unwrap_or_else(|| CourseProgress::new(&user_id, &course_id, now));
    let already_paid = uow
        .has_transaction(&user_id, &course_id, None, TransactionType::CourseCompleted)
        .await?;

    if already_paid {
        if progress.status != ProgressStatus::Completed {
            progress.set_status(ProgressStatus::Completed, now);
            uow.save_course_progress(&progress).await?;
        }
        return Ok(None);
    }

    progress.course_points += i64::from(bonus);
    progress.set_status(ProgressStatus::Completed, now);
    uow.save_course_progress(&progress).await?;

    let mut user = uow.user_for_update(&user_id).await?;
    user.credit(bonus, now);
    uow.save_user(&user).await?;

    let transaction = PointTransaction::new(
        &user_id,
        TransactionType::CourseCompleted,
        bonus,
        format!("Course completion bonus (+{bonus} points)"),
    )
    .for_course(&course_id);
    uow.insert_transaction(&transaction).await?;

    Ok(Some(transaction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::FailingStore;
    use crate::store::MemoryStore;

    fn service() -> (PointsService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            PointsService::new(store.clone(), PointsConfig::default()),
            store,
        )
    }

    async fn ledger_sum(store: &MemoryStore, user_id: &str) -> i64 {
        store
            .recent_transactions(user_id, usize::MAX)
            .await
            .unwrap()
            .iter()
            .map(|t| i64::from(t.points))
            .sum()
    }

    #[test]
    fn streak_bonus_starts_on_second_answer_and_is_capped() {
        let config = PointsConfig::default();
        assert_eq!(streak_bonus(1, &config), 0);
        assert_eq!(streak_bonus(2, &config), 4);
        assert_eq!(streak_bonus(25, &config), 50);
        assert_eq!(streak_bonus(26, &config), 50);
        assert_eq!(streak_bonus(u32::MAX, &config), 50);
    }

    #[test]
    fn limit_defaults_when_missing_or_non_positive() {
        assert_eq!(effective_limit(None), 10);
        assert_eq!(effective_limit(Some(0)), 10);
        assert_eq!(effective_limit(Some(-3)), 10);
        assert_eq!(effective_limit(Some(25)), 25);
    }

    #[tokio::test]
    async fn third_consecutive_answer_earns_streak_bonus() {
        let (points, store) = service();
        for _ in 0..2 {
            points
                .award_for_answer("alice", "rust", "ownership", "q1", true)
                .await
                .unwrap();
        }

        let third = points
            .award_for_answer("alice", "rust", "ownership", "q1", true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(third.points, 16);
        assert_eq!(
            third.description,
            "Correct answer (+10 points) with streak bonus of 3 consecutive correct answers (+6 points)"
        );
        let lesson = points
            .get_lesson_points("alice", "rust", "ownership")
            .await
            .unwrap();
        assert_eq!(lesson.current_streak, 3);
        assert_eq!(lesson.total_points, 10 + 14 + 16);
        assert_eq!(ledger_sum(&store, "alice").await, 40);
    }

    #[tokio::test]
    async fn first_correct_answer_has_no_bonus() {
        let (points, _) = service();
        let first = points
            .award_for_answer("alice", "rust", "ownership", "q1", true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.points, 10);
        assert_eq!(first.description, "Correct answer (+10 points)");
        assert_eq!(first.exercise_id.as_deref(), Some("q1"));
    }

    #[tokio::test]
    async fn incorrect_answer_resets_streak_and_keeps_max() {
        let (points, store) = service();
        for _ in 0..3 {
            points
                .award_for_answer("alice", "rust", "ownership", "q1", true)
                .await
                .unwrap();
        }

        let result = points
            .award_for_answer("alice", "rust", "ownership", "q2", false)
            .await
            .unwrap();

        assert!(result.is_none());
        let lesson = points
            .get_lesson_points("alice", "rust", "ownership")
            .await
            .unwrap();
        assert_eq!(lesson.current_streak, 0);
        assert_eq!(lesson.max_streak, 3);
        assert_eq!(store.recent_transactions("alice", 100).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn incorrect_first_answer_creates_lesson_record() {
        let (points, store) = service();
        points
            .award_for_answer("bob", "rust", "ownership", "q1", false)
            .await
            .unwrap();

        let progress = store
            .get_lesson_progress(&LessonKey::new("bob", "rust", "ownership"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(progress.current_streak, 0);
        assert!(store.get_user("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lesson_completion_bonus_is_paid_once() {
        let (points, store) = service();

        let first = points
            .award_lesson_completion_bonus("alice", "rust", "ownership")
            .await
            .unwrap()
            .unwrap();
        let second = points
            .award_lesson_completion_bonus("alice", "rust", "ownership")
            .await
            .unwrap();

        assert_eq!(first.points, 50);
        assert_eq!(first.description, "Lesson completion bonus (+50 points)");
        assert!(second.is_none());

        let progress = store
            .get_lesson_progress(&LessonKey::new("alice", "rust", "ownership"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(progress.status, ProgressStatus::Completed);
        assert!(progress.completed_at.is_some());
        assert_eq!(store.get_user("alice").await.unwrap().unwrap().total_points, 50);
    }

    #[tokio::test]
    async fn answers_after_completion_keep_lesson_completed() {
        let (points, store) = service();
        points
            .award_lesson_completion_bonus("alice", "rust", "ownership")
            .await
            .unwrap();
        points
            .award_for_answer("alice", "rust", "ownership", "q1", true)
            .await
            .unwrap();

        let progress = store
            .get_lesson_progress(&LessonKey::new("alice", "rust", "ownership"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(progress.status, ProgressStatus::Completed);
    }

    #[tokio::test]
    async fn course_completion_bonus_is_paid_once() {
        let (points, store) = service();

        let first = points
            .award_course_completion_bonus("alice", "rust")
            .await
            .unwrap()
            .unwrap();
        let second = points
            .award_course_completion_bonus("alice", "rust")
            .await
            .unwrap();

        assert_eq!(first.points, 200);
        assert_eq!(first.lesson_id, None);
        assert!(second.is_none());
        let course = store
            .get_course_progress("alice", "rust")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(course.status, ProgressStatus::Completed);
        assert_eq!(course.course_points, 200);
    }

    #[tokio::test]
    async fn failed_ledger_insert_rolls_back_streak_and_total() {
        let inner = MemoryStore::new();
        let store = Arc::new(FailingStore::ledger(inner.clone()));
        let points = PointsService::new(store, PointsConfig::default());

        let result = points
            .award_for_answer("alice", "rust", "ownership", "q1", true)
            .await;

        assert!(result.is_err());
        assert!(inner
            .get_lesson_progress(&LessonKey::new("alice", "rust", "ownership"))
            .await
            .unwrap()
            .is_none());
        assert!(inner.get_user("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn totals_report_best_streaks_across_lessons() {
        let (points, store) = service();
        for lesson in ["ownership", "ownership", "traits"] {
            points
                .award_for_answer("alice", "rust", lesson, "q", true)
                .await
                .unwrap();
        }

        let totals = points.get_user_total_points("alice").await.unwrap();
        assert_eq!(totals.current_streak, 2);
        assert_eq!(totals.max_streak, 2);
        assert_eq!(totals.total_points, ledger_sum(&store, "alice").await);
    }

    #[tokio::test]
    async fn leaderboard_ranks_from_one() {
        let (points, _) = service();
        points
            .award_for_answer("alice", "rust", "ownership", "q", true)
            .await
            .unwrap();
        points
            .award_course_completion_bonus("bob", "rust")
            .await
            .unwrap();

        let board = points.get_leaderboard(None).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].user_id, "bob");
        assert_eq!(board[1].rank, 2);
        assert_eq!(board[1].total_points, 10);
    }

    #[tokio::test]
    async fn unknown_lesson_reports_zero_points() {
        let (points, _) = service();
        let lesson = points
            .get_lesson_points("nobody", "rust", "ownership")
            .await
            .unwrap();
        assert_eq!(lesson.total_points, 0);
        assert_eq!(lesson.current_streak, 0);
    }

    #[tokio::test]
    async fn streak_reset_keeps_points_and_max() {
        let (points, _) = service();
        for _ in 0..2 {
            points
                .award_for_answer("alice", "rust", "ownership", "q1", true)
                .await
                .unwrap();
        }

        points
            .reset_lesson_streak("alice", "rust", "ownership")
            .await
            .unwrap();
        points
            .reset_lesson_streak("alice", "rust", "untouched")
            .await
            .unwrap();

        let lesson = points
            .get_lesson_points("alice", "rust", "ownership")
            .await
            .unwrap();
        assert_eq!(lesson.current_streak, 0);
        assert_eq!(lesson.max_streak, 2);
        assert_eq!(lesson.total_points, 24);

        let next = points
            .award_for_answer("alice", "rust", "ownership", "q2", true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.points, 10);
    }
}
