use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Per-user running totals kept next to the point ledger.
///
/// `total_points` always equals the sum of the user's point transactions;
/// both are written inside the same unit of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserAggregate {
    pub user_id: String,
    pub total_points: i64,
    pub current_daily_streak: u32,
    pub max_daily_streak: u32,
    pub last_login_date: Option<NaiveDate>,
    pub total_attempts: u32,
    pub correct_attempts: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserAggregate {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Self::default()
        }
    }

    pub fn credit(&mut self, points: i32, now: DateTime<Utc>) {
        self.total_points += i64::from(points);
        self.updated_at = Some(now);
    }

    pub fn accuracy_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        f64::from(self.correct_attempts) / f64::from(self.total_attempts) * 100.0
    }
}
