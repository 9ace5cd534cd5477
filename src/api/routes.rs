use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and fleet status
        .route("/health", get(handlers::health_handler))
        .route("/api/agents", get(handlers::get_agents))
        // Pipeline endpoints
        .route("/api/pipeline/run", post(handlers::run_pipeline))
        .route("/api/ideas", get(handlers::get_ideas))
        .route("/api/feasibility", post(handlers::score_feasibility))
        .route("/api/references", post(handlers::get_references))
        .route("/api/github/push", post(handlers::github_push))
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
