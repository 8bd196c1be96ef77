use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kan_core::KanError;
use serde_json::json;

/// Boundary where the error taxonomy becomes status codes.
pub struct ApiError(pub KanError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<KanError> for ApiError {
    fn from(err: KanError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            KanError::NotFound(_) | KanError::NotInitialized(_) => StatusCode::NOT_FOUND,
            KanError::AlreadyExists(_) => StatusCode::CONFLICT,
            KanError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("API error: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: KanError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(KanError::NotFound("card".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(KanError::NotInitialized("/x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(KanError::AlreadyExists("alias".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(KanError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(KanError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
