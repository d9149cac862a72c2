use axum::{Json, extract::State};

use crate::state::AppState;
use hindsight_core::stats::{statistics, Statistics};

pub fn router() -> axum::Router<AppState> {
    use axum::routing::get;
    axum::Router::new().route("/stats", get(get_stats))
}

async fn get_stats(State(state): State<AppState>) -> Json<Statistics> {
    Json(statistics(state.memory.store().as_ref()).await)
}
