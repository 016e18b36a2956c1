use axum::{
    extract::{Extension, Path, State},
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{
        points::{AwardResponse, LessonPoints},
        progress::{
            CourseProgress, CourseProgressWithPercentage, LessonProgress, UpdateProgressRequest,
        },
    },
    services::{points_service::PointsService, progress_service::ProgressService, AppState},
};

use super::ApiError;

fn points_service(state: &AppState) -> PointsService {
    PointsService::new(state.store.clone(), state.config.points.clone())
}

/// GET /api/v1/courses/{course_id}/progress
pub async fn get_course_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseProgressWithPercentage>, ApiError> {
    let total_lessons = state.content.get_course(&course_id)?.lessons.len();

    let progress = ProgressService::new(state.store.clone())
        .get_course_progress_with_percentage(&claims.sub, &course_id, total_lessons)
        .await?;

    Ok(Json(progress))
}

/// POST /api/v1/courses/{course_id}/progress
pub async fn update_course_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<UpdateProgressRequest>,
) -> Result<Json<CourseProgress>, ApiError> {
    state.content.get_course(&course_id)?;

    let progress = ProgressService::new(state.store.clone())
        .update_course_progress(&claims.sub, &course_id, req.status)
        .await?;

    Ok(Json(progress))
}

/// POST /api/v1/courses/{course_id}/complete
pub async fn complete_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<Json<AwardResponse>, ApiError> {
    state.content.get_course(&course_id)?;

    let transaction = points_service(&state)
        .award_course_completion_bonus(&claims.sub, &course_id)
        .await?;

    Ok(Json(transaction.into()))
}

/// GET /api/v1/courses/{course_id}/lessons/{lesson_id}/progress
pub async fn get_lesson_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> Result<Json<LessonProgress>, ApiError> {
    state.content.get_lesson(&course_id, &lesson_id)?;

    let progress = ProgressService::new(state.store.clone())
        .get_or_create_lesson_progress(&claims.sub, &course_id, &lesson_id)
        .await?;

    Ok(Json(progress))
}

/// POST /api/v1/courses/{course_id}/lessons/{lesson_id}/progress
pub async fn update_lesson_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
    AppJson(req): AppJson<UpdateProgressRequest>,
) -> Result<Json<LessonProgress>, ApiError> {
    state.content.get_lesson(&course_id, &lesson_id)?;

    let progress = ProgressService::new(state.store.clone())
        .update_lesson_progress(&claims.sub, &course_id, &lesson_id, req.status)
        .await?;

    Ok(Json(progress))
}

/// POST /api/v1/courses/{course_id}/lessons/{lesson_id}/complete
pub async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> Result<Json<AwardResponse>, ApiError> {
    state.content.get_lesson(&course_id, &lesson_id)?;

    let transaction = points_service(&state)
        .award_lesson_completion_bonus(&claims.sub, &course_id, &lesson_id)
        .await?;

    Ok(Json(transaction.into()))
}

/// GET /api/v1/courses/{course_id}/lessons/{lesson_id}/points
pub async fn get_lesson_points(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> Result<Json<LessonPoints>, ApiError> {
    state.content.get_lesson(&course_id, &lesson_id)?;

    let points = points_service(&state)
        .get_lesson_points(&claims.sub, &course_id, &lesson_id)
        .await?;

    Ok(Json(points))
}

/// POST /api/v1/courses/{course_id}/lessons/{lesson_id}/streak/reset
pub async fn reset_lesson_streak(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> Result<Json<LessonPoints>, ApiError> {
    state.content.get_lesson(&course_id, &lesson_id)?;

    let service = points_service(&state);
    service
        .reset_lesson_streak(&claims.sub, &course_id, &lesson_id)
        .await?;
    let points = service
        .get_lesson_points(&claims.sub, &course_id, &lesson_id)
        .await?;

    Ok(Json(points))
}
