use axum::{
    extract::{Extension, Path, State},
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{
        answer::{ExerciseAttemptRequest, ExerciseAttemptResponse},
        content::{CourseView, LessonView},
    },
    services::{exercise_service::ExerciseService, AppState},
};

use super::ApiError;

/// GET /api/v1/courses
pub async fn list_courses(State(state): State<Arc<AppState>>) -> Json<Vec<CourseView>> {
    Json(state.content.list_courses().map(CourseView::from).collect())
}

/// GET /api/v1/courses/{course_id}
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseView>, ApiError> {
    let course = state.content.get_course(&course_id)?;
    Ok(Json(CourseView::from(course)))
}

/// GET /api/v1/courses/{course_id}/lessons/{lesson_id}
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> Result<Json<LessonView>, ApiError> {
    let lesson = state.content.get_lesson(&course_id, &lesson_id)?;
    Ok(Json(LessonView::from(lesson)))
}

/// POST /api/v1/courses/{course_id}/lessons/{lesson_id}/exercises/{exercise_id}/attempt
pub async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id, exercise_id)): Path<(String, String, String)>,
    AppJson(req): AppJson<ExerciseAttemptRequest>,
) -> Result<Json<ExerciseAttemptResponse>, ApiError> {
    tracing::info!(
        "Attempt by user_id={} on {}/{}/{}",
        claims.sub,
        course_id,
        lesson_id,
        exercise_id
    );

    let service = ExerciseService::new(
        state.content.clone(),
        state.store.clone(),
        state.config.points.clone(),
    );
    let response = service
        .submit_attempt(&claims.sub, &course_id, &lesson_id, &exercise_id, req.answer)
        .await?;

    Ok(Json(response))
}
