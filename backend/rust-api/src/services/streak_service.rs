use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use crate::config::PointsConfig;
use crate::errors::StoreError;
use crate::metrics;
use crate::models::points::{AccuracyStats, DailyStreakInfo, PointTransaction, TransactionType};
use crate::models::user::UserAggregate;
use crate::store::{in_unit_of_work, Store, UnitOfWork};
use crate::utils::time::utc_today;

/// Points for reaching `new_streak` consecutive login days, if any.
///
/// `previous` is the streak carried into this login (0 after a break). The
/// first configured milestone crossed by the step pays the milestone bonus.
pub fn daily_streak_award(
    previous: u32,
    new_streak: u32,
    config: &PointsConfig,
) -> Option<(i32, String)> {
    if new_streak <= 1 {
        return None;
    }

    let milestone = config
        .daily_streak_milestones
        .iter()
        .copied()
        .find(|&m| previous < m && m <= new_streak);

    let (points, description) = match milestone {
        Some(m) => {
            let points = i64::from(m) * i64::from(config.milestone_bonus_multiplier);
            let points = i32::try_from(points).unwrap_or(i32::MAX);
            (
                points,
                format!("Milestone bonus: {m}-day login streak (+{points} points)"),
            )
        }
        None => {
            let points = config.daily_streak_bonus_points;
            (
                points,
                format!("Daily login streak bonus: {new_streak} days (+{points} points)"),
            )
        }
    };

    (points > 0).then_some((points, description))
}

/// Current streak as of `today`: a streak not extended yesterday or today is
/// already broken.
fn effective_streak(user: &UserAggregate, today: NaiveDate) -> u32 {
    match user.last_login_date {
        Some(last) if last == today || last.succ_opt() == Some(today) => user.current_daily_streak,
        _ => 0,
    }
}

pub struct DailyStreakService {
    store: Arc<dyn Store>,
    config: PointsConfig,
}

impl DailyStreakService {
    pub fn new(store: Arc<dyn Store>, config: PointsConfig) -> Self {
        Self { store, config }
    }

    /// Registers today's login for `user_id`.
    pub async fn update_daily_streak(
        &self,
        user_id: &str,
    ) -> Result<Option<PointTransaction>, StoreError> {
        self.update_daily_streak_on(user_id, utc_today()).await
    }

    pub async fn update_daily_streak_on(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<Option<PointTransaction>, StoreError> {
        let user = user_id.to_string();
        let config = self.config.clone();

        let transaction = in_unit_of_work(self.store.as_ref(), "update_daily_streak", move |uow| {
            Box::pin(check_in(uow, user, today, config))
        })
        .await?;

        if let Some(t) = &transaction {
            metrics::record_points(t.transaction_type.as_str(), t.points);
            tracing::info!(user_id, points = t.points, "{}", t.description);
        }
        Ok(transaction)
    }

    pub async fn get_daily_streak(&self, user_id: &str) -> Result<DailyStreakInfo, StoreError> {
        self.get_daily_streak_on(user_id, utc_today()).await
    }

    pub async fn get_daily_streak_on(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<DailyStreakInfo, StoreError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .unwrap_or_else(|| UserAggregate::new(user_id));
        let current = effective_streak(&user, today);
        let next_milestone = self
            .config
            .daily_streak_milestones
            .iter()
            .copied()
            .filter(|&m| m > current)
            .min();

        Ok(DailyStreakInfo {
            user_id: user_id.to_string(),
            current_streak: current,
            max_streak: user.max_daily_streak,
            last_login_date: user.last_login_date,
            next_milestone,
            days_to_milestone: next_milestone.map(|m| m - current),
        })
    }

    pub async fn update_accuracy_stats(
        &self,
        user_id: &str,
        is_correct: bool,
    ) -> Result<AccuracyStats, StoreError> {
        let user = user_id.to_string();
        let stats = in_unit_of_work(self.store.as_ref(), "update_accuracy_stats", move |uow| {
            Box::pin(async move { record_accuracy(uow, &user, is_correct).await })
        })
        .await?;

        tracing::debug!(
            user_id,
            total = stats.total_attempts,
            correct = stats.correct_attempts,
            "Accuracy updated"
        );
        Ok(stats)
    }

    pub async fn get_accuracy_stats(&self, user_id: &str) -> Result<AccuracyStats, StoreError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .unwrap_or_else(|| UserAggregate::new(user_id));
        Ok(accuracy_of(&user))
    }
}

fn accuracy_of(user: &UserAggregate) -> AccuracyStats {
    AccuracyStats {
        user_id: user.user_id.clone(),
        total_attempts: user.total_attempts,
        correct_attempts: user.correct_attempts,
        accuracy_rate: user.accuracy_rate(),
    }
}

async fn check_in(
    uow: &mut dyn UnitOfWork,
    user_id: String,
    today: NaiveDate,
    config: PointsConfig,
) -> Result<Option<PointTransaction>, StoreError> {
    let mut user = uow.user_for_update(&user_id).await?;
    if user.last_login_date == Some(today) {
        return Ok(None);
    }

    let continued = user.last_login_date.and_then(|d| d.succ_opt()) == Some(today);
    let previous = if continued {
        user.current_daily_streak
    } else {
        0
    };
    let new_streak = previous + 1;

    user.current_daily_streak = new_streak;
    user.max_daily_streak = user.max_daily_streak.max(new_streak);
    user.last_login_date = Some(today);

    let now = Utc::now();
    let award = daily_streak_award(previous, new_streak, &config);
    match &award {
        Some((points, _)) => user.credit(*points, now),
        None => user.updated_at = Some(now),
    }
    uow.save_user(&user).await?;

    let Some((points, description)) = award else {
        return Ok(None);
    };
    let transaction = PointTransaction::new(
        &user_id,
        TransactionType::DailyStreakBonus,
        points,
        description,
    );
    uow.insert_transaction(&transaction).await?;
    Ok(Some(transaction))
}

/// Counts one more attempt on the user aggregate.
pub(crate) async fn record_accuracy(
    uow: &mut dyn UnitOfWork,
    user_id: &str,
    is_correct: bool,
) -> Result<AccuracyStats, StoreError> {
    let mut aggregate = uow.user_for_update(user_id).await?;
    aggregate.total_attempts += 1;
    if is_correct {
        aggregate.correct_attempts += 1;
    }
    aggregate.updated_at = Some(Utc::now());
    uow.save_user(&aggregate).await?;
    Ok(accuracy_of(&aggregate))
}
