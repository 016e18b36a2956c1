use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        // Protected endpoints (require JWT)
        .nest(
            "/api/v1",
            api_routes()
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                ))
                .layer(cors),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/courses", course_routes())
        .route("/points/summary", get(handlers::points::points_summary))
        .route("/leaderboard", get(handlers::points::leaderboard))
        .nest("/stats", stats_routes())
}

fn course_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::courses::list_courses))
        .route("/{course_id}", get(handlers::courses::get_course))
        .route(
            "/{course_id}/progress",
            get(handlers::progress::get_course_progress)
                .post(handlers::progress::update_course_progress),
        )
        .route(
            "/{course_id}/complete",
            post(handlers::progress::complete_course),
        )
        .route(
            "/{course_id}/lessons/{lesson_id}",
            get(handlers::courses::get_lesson),
        )
        .route(
            "/{course_id}/lessons/{lesson_id}/progress",
            get(handlers::progress::get_lesson_progress)
                .post(handlers::progress::update_lesson_progress),
        )
        .route(
            "/{course_id}/lessons/{lesson_id}/complete",
            post(handlers::progress::complete_lesson),
        )
        .route(
            "/{course_id}/lessons/{lesson_id}/points",
            get(handlers::progress::get_lesson_points),
        )
        .route(
            "/{course_id}/lessons/{lesson_id}/streak/reset",
            post(handlers::progress::reset_lesson_streak),
        )
        .route(
            "/{course_id}/lessons/{lesson_id}/exercises/{exercise_id}/attempt",
            post(handlers::courses::submit_attempt),
        )
}

fn stats_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/daily-streak", get(handlers::stats::daily_streak))
        .route("/daily-streak/check-in", post(handlers::stats::check_in))
        .route("/accuracy", get(handlers::stats::accuracy))
}
