use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/activities",
            get(handlers::list_activities).post(handlers::create_activity),
        )
        .route("/api/activities/:id", delete(handlers::delete_activity))
        .route("/api/activities/:id/completions", get(handlers::get_completions))
        .route("/api/activities/:id/toggle", post(handlers::toggle))
        .route("/api/activities/:id/stats", get(handlers::get_stats))
        .route("/api/agenda", get(handlers::get_agenda))
        .route("/api/horizon", post(handlers::run_horizon))
        .with_state(state)
}
