use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::QuizError;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // token is optional here and checked by the handler itself
        .route("/ws", get(handlers::ws::ws_handler))
        .nest(
            "/api/v1/sessions",
            sessions_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .nest(
            "/api/v1/admin",
            admin_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(middlewares::metrics::metrics_middleware))
        .layer(middleware::from_fn(middlewares::trace::trace_context_middleware))
        .layer(TraceLayer::new_for_http())
}

fn sessions_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{id}", get(handlers::sessions::get_session))
        .route("/{id}/join", post(handlers::sessions::join_session))
        .route("/{id}/participants", get(handlers::sessions::get_participants))
        .route(
            "/{id}/current-question",
            get(handlers::sessions::get_current_question),
        )
        .route("/{id}/answers", post(handlers::sessions::submit_answer))
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/sessions",
            get(handlers::admin::list_sessions).post(handlers::admin::create_session),
        )
        .route("/sessions/{id}/control", post(handlers::admin::control_session))
        .route("/sessions/{id}/stats", get(handlers::admin::session_stats))
        .route("/sessions/{id}/results", get(handlers::admin::session_results))
        .route(
            "/sessions/{id}/questions",
            get(handlers::admin::list_questions),
        )
        .route(
            "/sessions/{id}/generate-question",
            post(handlers::admin::generate_question),
        )
        .route(
            "/sessions/{id}/process-results",
            post(handlers::admin::process_results),
        )
        .route("/sessions/{id}/next-round", post(handlers::admin::next_round))
        .route(
            "/sessions/{id}/skip-question",
            post(handlers::admin::skip_question),
        )
        .route("/sessions/{id}/revival", post(handlers::admin::start_revival))
        .route_layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ))
}
