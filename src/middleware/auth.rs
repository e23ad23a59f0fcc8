use axum::{
    extract::{Extension, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;

/// Authenticated identity resolved from the bearer token. Handlers scope
/// every store query by this username, never one supplied by the client.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let auth_str = headers.get("Authorization")?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Guard for every protected route: missing or malformed header fails before
/// any store access; an unresolved token fails with the same 401 shape.
pub async fn auth_middleware(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(&headers).ok_or(ApiError::Auth("Authorization token required."))?;

    let username = state
        .credentials
        .resolve(token)
        .await?
        .ok_or(ApiError::Auth("Invalid or expired session token."))?;

    request.extensions_mut().insert(AuthUser { username });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        let headers = headers_with("Bearer abc123");
        assert_eq!(extract_bearer(&headers), Some("abc123"));
    }

    #[test]
    fn missing_header_is_none() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn wrong_scheme_is_none() {
        assert_eq!(extract_bearer(&headers_with("Basic abc123")), None);
        assert_eq!(extract_bearer(&headers_with("bearer abc123")), None);
    }

    #[test]
    fn bare_scheme_is_none() {
        assert_eq!(extract_bearer(&headers_with("Bearer ")), None);
        assert_eq!(extract_bearer(&headers_with("Bearer")), None);
    }
}
