use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod cvs;
pub mod feedback;
pub mod health;
pub mod jobs_board;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let cv_routes = Router::new()
        .route("/", post(cvs::upload_cv))
        .route("/current", get(cvs::current_cv))
        .route("/history", get(cvs::cv_history))
        .route("/:id/feedback", get(cvs::get_feedback))
        .route("/:id/analysis", get(cvs::get_analysis))
        .route("/:id/interactive", get(feedback::get_interactive_feedback))
        .route(
            "/:id/actions/:index/complete",
            post(feedback::complete_action),
        )
        .route("/:id/reprocess", post(cvs::reprocess_cv))
        .route("/:id/download", get(cvs::download_cv))
        .route("/:id", axum::routing::delete(cvs::delete_cv));

    let job_routes = Router::new()
        .route(
            "/",
            get(jobs_board::list_job_posts).post(jobs_board::create_job_post),
        )
        .route("/applications/me", get(jobs_board::my_applications))
        .route(
            "/:id",
            axum::routing::put(jobs_board::update_job_post)
                .delete(jobs_board::deactivate_job_post),
        )
        .route("/:id/apply", post(jobs_board::apply_to_job))
        .route("/:id/applications", get(jobs_board::list_applications))
        .route(
            "/:id/applications/:app_id/status",
            axum::routing::put(jobs_board::update_application_status),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/cvs", cv_routes)
        .nest("/api/jobs", job_routes)
        .route("/api/progress", get(feedback::get_progress))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    let upload_limit = state.config.max_upload_bytes + 64 * 1024;

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        // Multipart framing overhead on top of the file size cap.
        .layer(DefaultBodyLimit::max(upload_limit))
}
