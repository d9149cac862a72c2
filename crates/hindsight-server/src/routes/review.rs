use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{CreateReviewRequest, ListReviewsParams, ReviewResponse};
use hindsight_core::github::PullRequestRef;
use hindsight_core::model::ReviewSummary;
use hindsight_core::parser::parse_diff;

const DEFAULT_LIST_LIMIT: usize = 10;

pub fn router() -> axum::Router<AppState> {
    use axum::routing::{get, post};
    axum::Router::new()
        .route("/review", post(create_review))
        .route("/review/{id}", get(get_review))
        .route("/reviews", get(list_reviews))
}

async fn create_review(
    State(state): State<AppState>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let diff_content = resolve_diff_content(&state, &request).await?;
    let diff = parse_diff(&diff_content)?;

    let review_id = Uuid::new_v4();
    info!(%review_id, files = diff.files.len(), "generating review");

    let suggestions = state.reviews.generate_review(&diff, review_id).await?;
    state
        .reviews
        .store_review_session(review_id, &diff, &suggestions)
        .await?;

    Ok(Json(ReviewResponse {
        review_id,
        file_count: diff.files.len(),
        total_changes: diff.total_changes(),
        created_at: Utc::now(),
        suggestions,
    }))
}

/// Turn the request into raw diff text, fetching from GitHub when asked.
async fn resolve_diff_content(
    state: &AppState,
    request: &CreateReviewRequest,
) -> Result<String, ApiError> {
    match request.source.as_str() {
        "github" => {
            let pr = if let Some(url) = &request.url {
                PullRequestRef::parse_url(url)?
            } else if let (Some(owner), Some(repo), Some(number)) = (
                &request.repo_owner,
                &request.repo_name,
                request.pr_number,
            ) {
                PullRequestRef {
                    owner: owner.clone(),
                    repo: repo.clone(),
                    number,
                }
            } else {
                return Err(ApiError::BadRequest(
                    "GitHub source requires either url or repo_owner + repo_name + pr_number"
                        .into(),
                ));
            };
            let (diff, _primary_path) = state.diff_source.fetch_pr(&pr).await?;
            Ok(diff)
        }
        "diff" => request
            .content
            .clone()
            .ok_or_else(|| ApiError::BadRequest("diff source requires content".into())),
        other => Err(ApiError::BadRequest(format!(
            "invalid source '{other}': expected 'github' or 'diff'"
        ))),
    }
}

async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewSummary>, ApiError> {
    state
        .reviews
        .get_review(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("review not found: {id}")))
}

async fn list_reviews(
    State(state): State<AppState>,
    Query(params): Query<ListReviewsParams>,
) -> Json<Vec<ReviewSummary>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Json(state.reviews.recent_reviews(limit).await)
}
