use axum::{Json, extract::State};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{FeedbackRequest, FeedbackResponse};
use hindsight_core::model::FeedbackAction;

pub fn router() -> axum::Router<AppState> {
    use axum::routing::post;
    axum::Router::new().route("/feedback", post(submit_feedback))
}

async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let action = match request.action.as_str() {
        "accept" => FeedbackAction::Accept,
        "reject" => FeedbackAction::Reject,
        "edit" => FeedbackAction::Edit,
        other => {
            return Err(ApiError::BadRequest(format!(
                "invalid action '{other}': expected 'accept', 'reject', or 'edit'"
            )));
        }
    };

    state
        .memory
        .apply_feedback(
            request.review_id,
            request.suggestion_id,
            action,
            request.reason,
            request.edited_suggestion,
        )
        .await?;

    info!(
        review_id = %request.review_id,
        suggestion_id = %request.suggestion_id,
        action = %request.action,
        "feedback recorded"
    );

    Ok(Json(FeedbackResponse {
        success: true,
        message: format!("feedback recorded: {}", request.action),
    }))
}
