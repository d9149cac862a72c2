use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use hindsight_core::engine::EngineError;
use hindsight_core::github::FetchError;
use hindsight_core::parser::ParseError;
use hindsight_core::store::StoreError;

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = json!({ "error": message });

        (status, axum::Json(body)).into_response()
    }
}

/// A diff that cannot be parsed is a problem with the submitted input.
impl From<ParseError> for ApiError {
    fn from(err: ParseError) -> Self {
        ApiError::BadRequest(format!("malformed diff: {err}"))
    }
}

/// The generation engine being down or broken is our problem, not the
/// caller's.
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RecordNotFound(id) => ApiError::NotFound(format!("record not found: {id}")),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn not_found_produces_404() {
        let err = ApiError::NotFound("missing".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn bad_request_produces_400() {
        let err = ApiError::BadRequest("invalid input".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_produces_500() {
        let err = ApiError::Internal("something broke".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn from_parse_error_is_bad_request() {
        let err = ParseError {
            line: 1,
            message: "not a diff".into(),
        };
        let api_err: ApiError = err.into();
        assert!(matches!(api_err, ApiError::BadRequest(_)));
    }

    #[test]
    fn from_engine_error_is_internal() {
        let err = EngineError::Unreachable("connection refused".into());
        let api_err: ApiError = err.into();
        assert!(matches!(api_err, ApiError::Internal(_)));
    }

    #[test]
    fn from_fetch_invalid_url_is_bad_request() {
        let err = FetchError::InvalidUrl("ftp://nope".into());
        let api_err: ApiError = err.into();
        assert!(matches!(api_err, ApiError::BadRequest(_)));
    }

    #[test]
    fn from_fetch_not_configured_is_internal() {
        let api_err: ApiError = FetchError::NotConfigured.into();
        assert!(matches!(api_err, ApiError::Internal(_)));
    }

    #[test]
    fn from_store_error_is_internal() {
        let err = StoreError::Persistence("disk full".into());
        let api_err: ApiError = err.into();
        assert!(matches!(api_err, ApiError::Internal(_)));
    }
}
