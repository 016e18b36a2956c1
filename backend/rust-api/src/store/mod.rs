//! Persistence contract for progress, ledger and user aggregates.
//!
//! Reads that do not feed a write go through [`Store`]; every read-then-write
//! sequence happens inside one [`UnitOfWork`], normally driven by
//! [`in_unit_of_work`].

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::time::Instant;

use crate::errors::StoreError;
use crate::metrics::{STORE_OPERATION_DURATION_SECONDS, UNITS_OF_WORK_TOTAL};
use crate::models::points::{PointTransaction, TransactionType};
use crate::models::progress::{CourseProgress, ExerciseAttempt, LessonKey, LessonProgress};
use crate::models::user::UserAggregate;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Starts a unit of work. Dropping it without `commit` discards its writes.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<UserAggregate>, StoreError>;

    async fn get_lesson_progress(
        &self,
        key: &LessonKey,
    ) -> Result<Option<LessonProgress>, StoreError>;

    /// All lesson records of a user, optionally restricted to one course.
    async fn list_lesson_progress(
        &self,
        user_id: &str,
        course_id: Option<&str>,
    ) -> Result<Vec<LessonProgress>, StoreError>;

    async fn get_course_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<CourseProgress>, StoreError>;

    /// Newest first.
    async fn recent_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<PointTransaction>, StoreError>;

    /// Users ordered by `total_points` descending.
    async fn top_users(&self, limit: usize) -> Result<Vec<UserAggregate>, StoreError>;
}

/// Write side of the store. The `*_for_update` reads lock the record until the
/// unit finishes.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn lesson_progress_for_update(
        &mut self,
        key: &LessonKey,
    ) -> Result<Option<LessonProgress>, StoreError>;

    async fn save_lesson_progress(&mut self, progress: &LessonProgress) -> Result<(), StoreError>;

    async fn course_progress_for_update(
        &mut self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<CourseProgress>, StoreError>;

    async fn save_course_progress(&mut self, progress: &CourseProgress) -> Result<(), StoreError>;

    /// Returns the user's aggregate, creating an empty one if none exists yet.
    async fn user_for_update(&mut self, user_id: &str) -> Result<UserAggregate, StoreError>;

    async fn save_user(&mut self, user: &UserAggregate) -> Result<(), StoreError>;

    /// Whether a transaction of `kind` exists for the user and course, and for
    /// `lesson_id` when given.
    async fn has_transaction(
        &mut self,
        user_id: &str,
        course_id: &str,
        lesson_id: Option<&str>,
        kind: TransactionType,
    ) -> Result<bool, StoreError>;

    async fn insert_transaction(&mut self, transaction: &PointTransaction)
        -> Result<(), StoreError>;

    /// Attempts already recorded by the user for one exercise.
    async fn count_attempts(&mut self, key: &LessonKey, exercise_id: &str)
        -> Result<u32, StoreError>;

    async fn insert_attempt(&mut self, attempt: &ExerciseAttempt) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Runs `work` inside one unit of work: commit on `Ok`, rollback on `Err`.
///
/// ```ignore
/// in_unit_of_work(store, "reset_streak", move |uow| {
///     Box::pin(async move { uow.user_for_update(&user_id).await })
/// })
/// .await?;
/// ```
pub async fn in_unit_of_work<T, F>(
    store: &dyn Store,
    operation: &'static str,
    work: F,
) -> Result<T, StoreError>
where
    T: Send,
    F: for<'a> FnOnce(&'a mut dyn UnitOfWork) -> BoxFuture<'a, Result<T, StoreError>> + Send,
{
    let start = Instant::now();
    let mut uow = store.begin().await?;

    let result = match work(&mut *uow).await {
        Ok(value) => match uow.commit().await {
            Ok(()) => Ok(value),
            Err(e) => {
                tracing::error!(operation, error = %e, "Commit failed");
                Err(e)
            }
        },
        Err(e) => {
            tracing::warn!(operation, error = %e, "Rolling back unit of work");
            if let Err(rollback_err) = uow.rollback().await {
                tracing::error!(operation, error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    };

    let outcome = if result.is_ok() {
        "committed"
    } else {
        "rolled_back"
    };
    UNITS_OF_WORK_TOTAL.with_label_values(&[outcome]).inc();
    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());

    result
}
