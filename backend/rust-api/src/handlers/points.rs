use axum::{
    extract::{Extension, State},
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::ValidQuery,
    middlewares::auth::JwtClaims,
    models::points::{LeaderboardEntry, LimitQuery, PointsSummary},
    services::{points_service::PointsService, AppState},
};

use super::ApiError;

/// GET /api/v1/points/summary
pub async fn points_summary(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidQuery(query): ValidQuery<LimitQuery>,
) -> Result<Json<PointsSummary>, ApiError> {
    let summary = PointsService::new(state.store.clone(), state.config.points.clone())
        .get_points_summary(&claims.sub, query.limit)
        .await?;

    Ok(Json(summary))
}

/// GET /api/v1/leaderboard
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<LimitQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let entries = PointsService::new(state.store.clone(), state.config.points.clone())
        .get_leaderboard(query.limit)
        .await?;

    Ok(Json(entries))
}
