use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use elevia_core::AppError;
use serde_json::json;

/// Transport wrapper translating engine errors into HTTP responses.
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::NotAuthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConstraintViolation(_) | AppError::InvalidExpression(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Policy(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Aggregate(_) => StatusCode::BAD_GATEWAY,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self.0 {
            AppError::Policy(issues) => json!({
                "error": "policy validation failed",
                "issues": issues,
            }),
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
