use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::auth::extract_bearer;
use crate::models::auth::{
    LoginRequest, LoginResponse, ProfileFields, ResetPasswordRequest, SignupRequest,
    VerifyUsernameRequest,
};
use crate::AppState;

const MIN_PASSWORD_CHARS: usize = 6;

pub fn auth_routes() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/verify_username", post(verify_username))
        .route("/reset_password", post(reset_password))
        .route("/signout", post(signout))
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

/// All six signup fields must be present and non-empty; absence and blank
/// both come back as the same 400.
fn validate_signup(payload: SignupRequest) -> Result<(String, String, ProfileFields), ApiError> {
    match (
        present(payload.username),
        present(payload.password),
        present(payload.full_name),
        present(payload.email),
        present(payload.phone_number),
        present(payload.country),
    ) {
        (
            Some(username),
            Some(password),
            Some(full_name),
            Some(email),
            Some(phone_number),
            Some(country),
        ) => Ok((
            username,
            password,
            ProfileFields {
                full_name,
                email,
                phone_number,
                country,
            },
        )),
        _ => Err(ApiError::Validation("Missing required fields.".to_string())),
    }
}

/// Character count, not byte count, so multi-byte passwords are measured the
/// way users see them.
fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::Validation(
            "New password must be at least 6 characters.".to_string(),
        ));
    }
    Ok(())
}

async fn signup(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (username, password, profile) = validate_signup(payload)?;

    state.credentials.create(&username, &password, &profile).await?;

    tracing::info!(username = %username, "new user registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Sign-up successful! Please log in now.",
            "username": username,
        })),
    ))
}

async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // Absent fields fall through to the same generic 401 as a bad password;
    // nothing about this route distinguishes why credentials failed.
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    let (session_token, username) = state
        .credentials
        .verify(&username, &password)
        .await?
        .ok_or(ApiError::Auth("Invalid username or password."))?;

    tracing::info!(username = %username, "login successful");

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        session_token,
        username,
    }))
}

/// Step 1 of password reset: does the username exist at all.
async fn verify_username(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<VerifyUsernameRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = payload.username.unwrap_or_default();

    state
        .credentials
        .lookup_profile(&username)
        .await?
        .ok_or(ApiError::NotFound(
            "User not found. Please check your username.",
        ))?;

    Ok(Json(json!({
        "message": format!("Username '{username}' verified."),
    })))
}

/// Step 2 of password reset. Success also invalidates any active session.
async fn reset_password(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = present(payload.username)
        .ok_or_else(|| ApiError::Validation("Missing required fields.".to_string()))?;
    let new_password = payload.new_password.unwrap_or_default();
    validate_password(&new_password)?;

    state.credentials.update_password(&username, &new_password).await?;

    tracing::info!(username = %username, "password reset, sessions invalidated");

    Ok(Json(json!({
        "message": "Password successfully reset. Please log in.",
    })))
}

/// Always 200, valid token or not, so the response leaks nothing about
/// token validity. A valid token is rotated away and cannot be replayed.
async fn signout(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    if let Some(token) = extract_bearer(&headers) {
        state.credentials.invalidate(token).await?;
    }

    Ok(Json(json!({ "message": "Signout successful." })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;
    use axum::body::Body;
    use axum::http::{header, Request};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    fn signup_request() -> SignupRequest {
        SignupRequest {
            username: Some("alice".into()),
            password: Some("pw123456".into()),
            full_name: Some("Alice A".into()),
            email: Some("a@x.com".into()),
            phone_number: Some("555".into()),
            country: Some("US".into()),
        }
    }

    /// Router over a lazy pool: validation paths never touch the database,
    /// so these tests need no live Postgres.
    fn test_router() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/timesheet_reviewer_test")
            .unwrap();
        let state = Arc::new(AppState {
            credentials: store::credentials::CredentialStore::new(pool.clone()),
            chats: store::chat::ChatStore::new(pool.clone()),
            timesheets: store::timesheet::TimesheetStore::new(pool),
            model_client: None,
        });
        auth_routes().layer(Extension(state))
    }

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn complete_signup_passes_validation() {
        assert!(validate_signup(signup_request()).is_ok());
    }

    #[test]
    fn blank_or_absent_field_fails_validation() {
        let mut payload = signup_request();
        payload.country = Some("   ".into());
        assert!(matches!(
            validate_signup(payload).unwrap_err(),
            ApiError::Validation(_)
        ));

        let mut payload = signup_request();
        payload.password = None;
        assert!(matches!(
            validate_signup(payload).unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn short_password_is_rejected() {
        assert!(validate_password("pw123").is_err());
        assert!(validate_password("pw1234").is_ok());
    }

    #[test]
    fn password_length_is_counted_in_characters() {
        // Three characters, nine bytes: still too short.
        assert!(validate_password("日本語").is_err());
        assert!(validate_password("日本語日本語").is_ok());
    }

    #[tokio::test]
    async fn missing_signup_field_is_400_not_422() {
        let response = test_router()
            .oneshot(json_post("/signup", r#"{"username":"alice"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_reset_password_is_400_not_422() {
        let response = test_router()
            .oneshot(json_post("/reset_password", r#"{"username":"alice"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = test_router()
            .oneshot(json_post("/reset_password", r#"{"new_password":"pw123456"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
