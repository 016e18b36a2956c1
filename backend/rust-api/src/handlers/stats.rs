use axum::{
    extract::{Extension, State},
    Json,
};
use std::sync::Arc;

use crate::{
    middlewares::auth::JwtClaims,
    models::points::{AccuracyStats, CheckInResponse, DailyStreakInfo},
    services::{streak_service::DailyStreakService, AppState},
};

use super::ApiError;

fn streak_service(state: &AppState) -> DailyStreakService {
    DailyStreakService::new(state.store.clone(), state.config.points.clone())
}

/// POST /api/v1/stats/daily-streak/check-in, called once per sign-in.
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<CheckInResponse>, ApiError> {
    let service = streak_service(&state);
    let transaction = service.update_daily_streak(&claims.sub).await?;
    let streak = service.get_daily_streak(&claims.sub).await?;

    Ok(Json(CheckInResponse {
        transaction,
        streak,
    }))
}

/// GET /api/v1/stats/daily-streak
pub async fn daily_streak(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<DailyStreakInfo>, ApiError> {
    Ok(Json(streak_service(&state).get_daily_streak(&claims.sub).await?))
}

/// GET /api/v1/stats/accuracy
pub async fn accuracy(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<AccuracyStats>, ApiError> {
    Ok(Json(
        streak_service(&state)
            .get_accuracy_stats(&claims.sub)
            .await?,
    ))
}
