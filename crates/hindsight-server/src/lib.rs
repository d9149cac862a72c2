use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

pub mod error;
pub mod state;
pub mod types;

pub mod routes {
    pub mod feedback;
    pub mod review;
    pub mod stats;
}

use state::AppState;

pub fn app(state: AppState) -> Router {
    let api = routes::review::router()
        .merge(routes::feedback::router())
        .merge(routes::stats::router())
        .route("/health", get(health));

    Router::new()
        .nest("/api", api)
        // The browser UI is served separately; let it talk to us from anywhere
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
