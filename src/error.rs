use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Error taxonomy for every route. Store and upstream failures carry their
/// source for logging but are never shown to the caller verbatim.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("database error")]
    Store(#[from] sqlx::Error),
    #[error("model API error")]
    Upstream(#[from] crate::openrouter_client::OpenRouterError),
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Store(_) | ApiError::Upstream(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to put in the response body. Internal details stay in
    /// the logs only.
    fn public_message(&self) -> String {
        match self {
            ApiError::Store(_) => "A database error occurred.".to_string(),
            ApiError::Upstream(_) => "The model service is unavailable.".to_string(),
            ApiError::Internal(_) => "An internal server error occurred.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ApiError::Internal(format!("password hashing failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Store(e) => tracing::error!("store error: {}", e),
            ApiError::Upstream(e) => tracing::error!("model API error: {}", e),
            ApiError::Internal(detail) => tracing::error!("internal error: {}", detail),
            ApiError::Auth(msg) => tracing::debug!("auth rejected: {}", msg),
            _ => {}
        }
        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            ApiError::Validation("missing field".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Auth("Authorization token required.").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::NotFound("Chat session not found").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("taken".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Store(sqlx::Error::PoolClosed).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_never_reach_the_body() {
        let err = ApiError::Store(sqlx::Error::PoolClosed);
        assert_eq!(err.public_message(), "A database error occurred.");

        let err = ApiError::Internal("secret path /var/db".into());
        assert!(!err.public_message().contains("/var/db"));
    }

    #[test]
    fn validation_message_is_passed_through() {
        let err = ApiError::Validation("Query is required.".into());
        assert_eq!(err.public_message(), "Query is required.");
    }
}
