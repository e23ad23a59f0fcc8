use axum::{
    extract::{multipart::Multipart, DefaultBodyLimit, Extension},
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::auth::{auth_middleware, AuthUser};
use crate::models::timesheet::Timesheet;
use crate::AppState;

pub fn upload_routes() -> Router {
    Router::new()
        .route("/upload", post(upload_file))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB is plenty for a CSV
        .layer(axum::middleware::from_fn(auth_middleware))
}

/// Accept a multipart CSV upload and replace the timesheet dataset with its
/// contents. The file is parsed straight from the request body; nothing is
/// written to disk.
async fn upload_file(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if field.file_name().map_or(true, |name| name.is_empty()) {
            return Err(ApiError::Validation("No selected file".to_string()));
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read file: {e}")))?;
        file_data = Some(data.to_vec());
        break;
    }

    let data = file_data.ok_or_else(|| ApiError::Validation("No file part".to_string()))?;

    let timesheet = Timesheet::from_csv(&data)?;
    state.timesheets.replace_all(&timesheet).await?;

    tracing::info!(
        username = %user.username,
        rows = timesheet.rows.len(),
        columns = timesheet.columns.len(),
        "timesheet uploaded"
    );

    Ok(Json(json!({
        "message": "File uploaded and processed successfully."
    })))
}
