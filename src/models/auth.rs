use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Everything about a user except the password hash and session token. The
/// hash never leaves the store layer; this is the only user shape that
/// serializes outward.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
}

/// Profile fields required at signup, all non-empty.
#[derive(Debug, Clone)]
pub struct ProfileFields {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub country: String,
}

/// Request bodies keep every field optional so an absent key reaches the
/// handler's own validation (400) instead of dying in the extractor (422).
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub session_token: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyUsernameRequest {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub username: Option<String>,
    pub new_password: Option<String>,
}
