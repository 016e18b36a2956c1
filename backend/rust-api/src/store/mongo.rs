use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::options::{IndexOptions, ReadConcern, ReturnDocument, WriteConcern};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Store, UnitOfWork};
use crate::errors::StoreError;
use crate::models::points::{PointTransaction, TransactionType};
use crate::models::progress::{CourseProgress, ExerciseAttempt, LessonKey, LessonProgress};
use crate::models::user::UserAggregate;
use crate::utils::time::{bson_to_chrono, chrono_to_bson};

const USER_STATS: &str = "user_stats";
const LESSON_PROGRESS: &str = "lesson_progress";
const COURSE_PROGRESS: &str = "course_progress";
const POINT_TRANSACTIONS: &str = "point_transactions";
const EXERCISE_ATTEMPTS: &str = "exercise_attempts";

/// Ledger row as stored; `created_at` is a BSON date so it sorts natively.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionDocument {
    id: String,
    user_id: String,
    course_id: Option<String>,
    lesson_id: Option<String>,
    exercise_id: Option<String>,
    transaction_type: TransactionType,
    points: i32,
    description: String,
    created_at: BsonDateTime,
}

impl From<&PointTransaction> for TransactionDocument {
    fn from(t: &PointTransaction) -> Self {
        Self {
            id: t.id.clone(),
            user_id: t.user_id.clone(),
            course_id: t.course_id.clone(),
            lesson_id: t.lesson_id.clone(),
            exercise_id: t.exercise_id.clone(),
            transaction_type: t.transaction_type,
            points: t.points,
            description: t.description.clone(),
            created_at: chrono_to_bson(t.created_at),
        }
    }
}

impl From<TransactionDocument> for PointTransaction {
    fn from(d: TransactionDocument) -> Self {
        Self {
            id: d.id,
            user_id: d.user_id,
            course_id: d.course_id,
            lesson_id: d.lesson_id,
            exercise_id: d.exercise_id,
            transaction_type: d.transaction_type,
            points: d.points,
            description: d.description,
            created_at: bson_to_chrono(d.created_at),
        }
    }
}

fn lesson_filter(key: &LessonKey) -> Document {
    doc! {
        "userId": &key.user_id,
        "courseId": &key.course_id,
        "lessonId": &key.lesson_id,
    }
}

fn course_filter(user_id: &str, course_id: &str) -> Document {
    doc! { "userId": user_id, "courseId": course_id }
}

fn lock_stamp() -> Document {
    doc! { "$set": { "lockedAt": BsonDateTime::now() } }
}

/// MongoDB backend. Units of work are multi-document transactions, so the
/// deployment must be a replica set.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        Ok(Self { client, db })
    }

    /// Unique keys back the one-record-per-key invariants; the rest serve the
    /// ledger and leaderboard queries.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.db
            .collection::<Document>(USER_STATS)
            .create_indexes([
                IndexModel::builder()
                    .keys(doc! { "userId": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "totalPoints": -1 })
                    .build(),
            ])
            .await?;

        self.db
            .collection::<Document>(LESSON_PROGRESS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "userId": 1, "courseId": 1, "lessonId": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        self.db
            .collection::<Document>(COURSE_PROGRESS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "userId": 1, "courseId": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        self.db
            .collection::<Document>(POINT_TRANSACTIONS)
            .create_indexes([
                IndexModel::builder()
                    .keys(doc! { "userId": 1, "createdAt": -1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! {
                        "userId": 1,
                        "courseId": 1,
                        "transactionType": 1,
                        "lessonId": 1,
                    })
                    .build(),
            ])
            .await?;

        self.db
            .collection::<Document>(EXERCISE_ATTEMPTS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! {
                        "userId": 1,
                        "courseId": 1,
                        "lessonId": 1,
                        "exerciseId": 1,
                    })
                    .build(),
            )
            .await?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let mut session = self.client.start_session().await?;
        session
            .start_transaction()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::majority())
            .await?;

        Ok(Box::new(MongoUnitOfWork {
            db: self.db.clone(),
            session,
            finished: false,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserAggregate>, StoreError> {
        Ok(self
            .db
            .collection::<UserAggregate>(USER_STATS)
            .find_one(doc! { "userId": user_id })
            .await?)
    }

    async fn get_lesson_progress(
        &self,
        key: &LessonKey,
    ) -> Result<Option<LessonProgress>, StoreError> {
        Ok(self
            .db
            .collection::<LessonProgress>(LESSON_PROGRESS)
            .find_one(lesson_filter(key))
            .await?)
    }

    async fn list_lesson_progress(
        &self,
        user_id: &str,
        course_id: Option<&str>,
    ) -> Result<Vec<LessonProgress>, StoreError> {
        let mut filter = doc! { "userId": user_id };
        if let Some(course_id) = course_id {
            filter.insert("courseId", course_id);
        }

        let lessons = self
            .db
            .collection::<LessonProgress>(LESSON_PROGRESS)
            .find(filter)
            .sort(doc! { "courseId": 1, "lessonId": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(lessons)
    }

    async fn get_course_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<CourseProgress>, StoreError> {
        Ok(self
            .db
            .collection::<CourseProgress>(COURSE_PROGRESS)
            .find_one(course_filter(user_id, course_id))
            .await?)
    }

    async fn recent_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<PointTransaction>, StoreError> {
        let documents: Vec<TransactionDocument> = self
            .db
            .collection::<TransactionDocument>(POINT_TRANSACTIONS)
            .find(doc! { "userId": user_id })
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await?
            .try_collect()
            .await?;
        Ok(documents.into_iter().map(PointTransaction::from).collect())
    }

    async fn top_users(&self, limit: usize) -> Result<Vec<UserAggregate>, StoreError> {
        let users = self
            .db
            .collection::<UserAggregate>(USER_STATS)
            .find(doc! {})
            .sort(doc! { "totalPoints": -1, "userId": 1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await?
            .try_collect()
            .await?;
        Ok(users)
    }
}

struct MongoUnitOfWork {
    db: Database,
    session: ClientSession,
    finished: bool,
}

impl MongoUnitOfWork {
    fn collection<T: Send + Sync>(&self, name: &str) -> Result<Collection<T>, StoreError> {
        if self.finished {
            return Err(StoreError::Finished);
        }
        Ok(self.db.collection::<T>(name))
    }
}

#[async_trait]
impl UnitOfWork for MongoUnitOfWork {
    async fn lesson_progress_for_update(
        &mut self,
        key: &LessonKey,
    ) -> Result<Option<LessonProgress>, StoreError> {
        let progress = self
            .collection::<LessonProgress>(LESSON_PROGRESS)?
            .find_one_and_update(lesson_filter(key), lock_stamp())
            .return_document(ReturnDocument::After)
            .session(&mut self.session)
            .await?;
        Ok(progress)
    }

    async fn save_lesson_progress(&mut self, progress: &LessonProgress) -> Result<(), StoreError> {
        self.collection::<LessonProgress>(LESSON_PROGRESS)?
            .replace_one(lesson_filter(&progress.key()), progress)
            .upsert(true)
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn course_progress_for_update(
        &mut self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<CourseProgress>, StoreError> {
        let progress = self
            .collection::<CourseProgress>(COURSE_PROGRESS)?
            .find_one_and_update(course_filter(user_id, course_id), lock_stamp())
            .return_document(ReturnDocument::After)
            .session(&mut self.session)
            .await?;
        Ok(progress)
    }

    async fn save_course_progress(&mut self, progress: &CourseProgress) -> Result<(), StoreError> {
        self.collection::<CourseProgress>(COURSE_PROGRESS)?
            .replace_one(
                course_filter(&progress.user_id, &progress.course_id),
                progress,
            )
            .upsert(true)
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn user_for_update(&mut self, user_id: &str) -> Result<UserAggregate, StoreError> {
        // Upserting here takes the document lock even for a brand-new user.
        let user = self
            .collection::<UserAggregate>(USER_STATS)?
            .find_one_and_update(doc! { "userId": user_id }, lock_stamp())
            .upsert(true)
            .return_document(ReturnDocument::After)
            .session(&mut self.session)
            .await?;
        Ok(user.unwrap_or_else(|| UserAggregate::new(user_id)))
    }

    async fn save_user(&mut self, user: &UserAggregate) -> Result<(), StoreError> {
        self.collection::<UserAggregate>(USER_STATS)?
            .replace_one(doc! { "userId": &user.user_id }, user)
            .upsert(true)
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn has_transaction(
        &mut self,
        user_id: &str,
        course_id: &str,
        lesson_id: Option<&str>,
        kind: TransactionType,
    ) -> Result<bool, StoreError> {
        let mut filter = doc! {
            "userId": user_id,
            "courseId": course_id,
            "transactionType": kind.as_str(),
        };
        if let Some(lesson_id) = lesson_id {
            filter.insert("lessonId", lesson_id);
        }

        let existing = self
            .collection::<Document>(POINT_TRANSACTIONS)?
            .find_one(filter)
            .session(&mut self.session)
            .await?;
        Ok(existing.is_some())
    }

    async fn insert_transaction(
        &mut self,
        transaction: &PointTransaction,
    ) -> Result<(), StoreError> {
        self.collection::<TransactionDocument>(POINT_TRANSACTIONS)?
            .insert_one(TransactionDocument::from(transaction))
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn count_attempts(
        &mut self,
        key: &LessonKey,
        exercise_id: &str,
    ) -> Result<u32, StoreError> {
        let mut filter = lesson_filter(key);
        filter.insert("exerciseId", exercise_id);

        let count = self
            .collection::<Document>(EXERCISE_ATTEMPTS)?
            .count_documents(filter)
            .session(&mut self.session)
            .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_attempt(&mut self, attempt: &ExerciseAttempt) -> Result<(), StoreError> {
        self.collection::<ExerciseAttempt>(EXERCISE_ATTEMPTS)?
            .insert_one(attempt)
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Finished);
        }
        self.finished = true;
        self.session.commit_transaction().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Finished);
        }
        self.finished = true;
        self.session.abort_transaction().await?;
        Ok(())
    }
}

/// Bounded startup check so a missing database fails fast.
pub async fn ping_with_timeout(store: &MongoStore, timeout: Duration) -> Result<(), StoreError> {
    tokio::time::timeout(timeout, store.ping())
        .await
        .map_err(|_| {
            StoreError::Other(anyhow::anyhow!(
                "MongoDB ping timeout after {}s",
                timeout.as_secs()
            ))
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, Utc};
    use mongodb::bson::{from_document, oid::ObjectId, to_document, Bson};
    use serde_json::json;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn freshly_upserted_user_reads_as_empty_aggregate() {
        let stored = doc! {
            "_id": ObjectId::new(),
            "userId": "alice",
            "lockedAt": BsonDateTime::now(),
        };

        let user: UserAggregate = from_document(stored).unwrap();

        assert_eq!(user, UserAggregate::new("alice"));
    }

    #[test]
    fn saved_user_keeps_counters_and_login_date() {
        let user = UserAggregate {
            total_points: 42,
            current_daily_streak: 3,
            max_daily_streak: 7,
            last_login_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            total_attempts: 9,
            correct_attempts: 6,
            updated_at: Some(at(1_714_521_600_000)),
            ..UserAggregate::new("alice")
        };

        let mut stored = to_document(&user).unwrap();
        assert_eq!(stored.get_str("userId").unwrap(), "alice");
        stored.insert("_id", ObjectId::new());
        stored.insert("lockedAt", BsonDateTime::now());

        assert_eq!(from_document::<UserAggregate>(stored).unwrap(), user);
    }

    #[test]
    fn locked_lesson_progress_still_decodes() {
        let key = LessonKey::new("alice", "rust", "ownership");
        let mut progress = LessonProgress::new(&key, at(1_000));
        progress.current_streak = 2;
        progress.max_streak = 4;
        progress.lesson_points = 37;
        progress.touch(at(2_000));

        let mut stored = to_document(&progress).unwrap();
        for field in ["userId", "courseId", "lessonId"] {
            assert_eq!(stored.get(field), lesson_filter(&key).get(field));
        }
        stored.insert("_id", ObjectId::new());
        stored.extend(lock_stamp().get_document("$set").unwrap().clone());

        assert_eq!(from_document::<LessonProgress>(stored).unwrap(), progress);
    }

    #[test]
    fn attempt_keeps_structured_answer() {
        let key = LessonKey::new("alice", "rust", "traits");
        let answer = json!([["Copy", "bitwise duplicate"], ["Clone", "explicit duplicate"]]);
        let mut attempt = ExerciseAttempt::new(&key, "match-traits", answer.clone(), true);
        attempt.attempt_number = 3;
        attempt.points_earned = 14;
        attempt.streak_at_attempt = 2;

        let stored = to_document(&attempt).unwrap();
        assert!(matches!(stored.get("answer"), Some(Bson::Array(_))));
        assert_eq!(stored.get_str("exerciseId").unwrap(), "match-traits");

        let decoded: ExerciseAttempt = from_document(stored).unwrap();
        assert_eq!(decoded.answer, answer);
        assert_eq!(decoded, attempt);
    }

    #[test]
    fn courseless_transaction_stores_null_course() {
        let mut transaction = PointTransaction::new(
            "alice",
            TransactionType::DailyStreakBonus,
            50,
            "7-day login streak bonus (+50 points)".to_string(),
        );
        transaction.created_at = at(1_714_521_600_123);

        let stored = to_document(&TransactionDocument::from(&transaction)).unwrap();
        assert_eq!(stored.get("courseId"), Some(&Bson::Null));
        assert_eq!(
            stored.get_str("transactionType").unwrap(),
            TransactionType::DailyStreakBonus.as_str()
        );
        assert!(matches!(stored.get("createdAt"), Some(Bson::DateTime(_))));

        let decoded: TransactionDocument = from_document(stored).unwrap();
        assert_eq!(PointTransaction::from(decoded), transaction);
    }
}
