use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, UnitOfWork};
use crate::errors::StoreError;
use crate::models::points::{PointTransaction, TransactionType};
use crate::models::progress::{CourseProgress, ExerciseAttempt, LessonKey, LessonProgress};
use crate::models::user::UserAggregate;

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<String, UserAggregate>,
    lessons: HashMap<LessonKey, LessonProgress>,
    courses: HashMap<(String, String), CourseProgress>,
    transactions: Vec<PointTransaction>,
    attempts: Vec<ExerciseAttempt>,
}

/// In-process store. Units of work are serialised: each holds the state mutex
/// for its whole lifetime, writes in place and reverts from an undo log unless
/// committed.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryUnitOfWork::new(guard)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserAggregate>, StoreError> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }

    async fn get_lesson_progress(
        &self,
        key: &LessonKey,
    ) -> Result<Option<LessonProgress>, StoreError> {
        Ok(self.state.lock().await.lessons.get(key).cloned())
    }

    async fn list_lesson_progress(
        &self,
        user_id: &str,
        course_id: Option<&str>,
    ) -> Result<Vec<LessonProgress>, StoreError> {
        let state = self.state.lock().await;
        let mut lessons: Vec<LessonProgress> = state
            .lessons
            .values()
            .filter(|p| p.user_id == user_id)
            .filter(|p| course_id.is_none_or(|c| p.course_id == c))
            .cloned()
            .collect();
        lessons.sort_by(|a, b| {
            (&a.course_id, &a.lesson_id).cmp(&(&b.course_id, &b.lesson_id))
        });
        Ok(lessons)
    }

    async fn get_course_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<CourseProgress>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .courses
            .get(&(user_id.to_string(), course_id.to_string()))
            .cloned())
    }

    async fn recent_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<PointTransaction>, StoreError> {
        let state = self.state.lock().await;
        // Insertion order breaks ties between equal timestamps.
        let mut transactions: Vec<PointTransaction> = state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        transactions.truncate(limit);
        Ok(transactions)
    }

    async fn top_users(&self, limit: usize) -> Result<Vec<UserAggregate>, StoreError> {
        let state = self.state.lock().await;
        let mut users: Vec<UserAggregate> = state.users.values().cloned().collect();
        users.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        users.truncate(limit);
        Ok(users)
    }
}

struct MemoryUnitOfWork {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    undo: Vec<Undo>,
    transactions_len: usize,
    attempts_len: usize,
}

/// Prior value of a keyed record overwritten by the unit.
enum Undo {
    User(String, Option<UserAggregate>),
    Lesson(LessonKey, Option<LessonProgress>),
    Course((String, String), Option<CourseProgress>),
}

fn restore<K: Hash + Eq, V>(map: &mut HashMap<K, V>, key: K, previous: Option<V>) {
    match previous {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

impl MemoryUnitOfWork {
    fn new(guard: OwnedMutexGuard<MemoryState>) -> Self {
        Self {
            transactions_len: guard.transactions.len(),
            attempts_len: guard.attempts.len(),
            guard: Some(guard),
            undo: Vec::new(),
        }
    }

    fn state(&self) -> Result<&MemoryState, StoreError> {
        self.guard.as_deref().ok_or(StoreError::Finished)
    }

    fn state_mut(&mut self) -> Result<&mut MemoryState, StoreError> {
        self.guard.as_deref_mut().ok_or(StoreError::Finished)
    }

    /// Undoes every write of a unit that still holds the lock.
    fn revert(&mut self) {
        let Some(state) = self.guard.as_deref_mut() else {
            return;
        };
        for undo in self.undo.drain(..).rev() {
            match undo {
                Undo::User(key, previous) => restore(&mut state.users, key, previous),
                Undo::Lesson(key, previous) => restore(&mut state.lessons, key, previous),
                Undo::Course(key, previous) => restore(&mut state.courses, key, previous),
            }
        }
        state.transactions.truncate(self.transactions_len);
        state.attempts.truncate(self.attempts_len);
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        self.revert();
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lesson_progress_for_update(
        &mut self,
        key: &LessonKey,
    ) -> Result<Option<LessonProgress>, StoreError> {
        Ok(self.state()?.lessons.get(key).cloned())
    }

    async fn save_lesson_progress(&mut self, progress: &LessonProgress) -> Result<(), StoreError> {
        let key = progress.key();
        let previous = self
            .state_mut()?
            .lessons
            .insert(key.clone(), progress.clone());
        self.undo.push(Undo::Lesson(key, previous));
        Ok(())
    }

    async fn course_progress_for_update(
        &mut self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<CourseProgress>, StoreError> {
        Ok(self
            .state()?
            .courses
            .get(&(user_id.to_string(), course_id.to_string()))
            .cloned())
    }

    async fn save_course_progress(&mut self, progress: &CourseProgress) -> Result<(), StoreError> {
        let key = (progress.user_id.clone(), progress.course_id.clone());
        let previous = self
            .state_mut()?
            .courses
            .insert(key.clone(), progress.clone());
        self.undo.push(Undo::Course(key, previous));
        Ok(())
    }

    async fn user_for_update(&mut self, user_id: &str) -> Result<UserAggregate, StoreError> {
        Ok(self
            .state()?
            .users
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserAggregate::new(user_id)))
    }

    async fn save_user(&mut self, user: &UserAggregate) -> Result<(), StoreError> {
        let previous = self
            .state_mut()?
            .users
            .insert(user.user_id.clone(), user.clone());
        self.undo.push(Undo::User(user.user_id.clone(), previous));
        Ok(())
    }

    async fn has_transaction(
        &mut self,
        user_id: &str,
        course_id: &str,
        lesson_id: Option<&str>,
        kind: TransactionType,
    ) -> Result<bool, StoreError> {
        Ok(self.state()?.transactions.iter().any(|t| {
            t.user_id == user_id
                && t.course_id.as_deref() == Some(course_id)
                && lesson_id.is_none_or(|l| t.lesson_id.as_deref() == Some(l))
                && t.transaction_type == kind
        }))
    }

    async fn insert_transaction(
        &mut self,
        transaction: &PointTransaction,
    ) -> Result<(), StoreError> {
        self.state_mut()?.transactions.push(transaction.clone());
        Ok(())
    }

    async fn count_attempts(
        &mut self,
        key: &LessonKey,
        exercise_id: &str,
    ) -> Result<u32, StoreError> {
        let count = self
            .state()?
            .attempts
            .iter()
            .filter(|a| {
                a.user_id == key.user_id
                    && a.course_id == key.course_id
                    && a.lesson_id == key.lesson_id
                    && a.exercise_id == exercise_id
            })
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_attempt(&mut self, attempt: &ExerciseAttempt) -> Result<(), StoreError> {
        self.state_mut()?.attempts.push(attempt.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.guard.take().ok_or(StoreError::Finished)?;
        self.undo.clear();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.state()?;
        self.revert();
        self.guard = None;
        Ok(())
    }
}
