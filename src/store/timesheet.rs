use sqlx::PgPool;

use crate::error::ApiError;
use crate::models::timesheet::Timesheet;

/// The single current timesheet dataset. An upload replaces everything that
/// was there before; reads return the full rectangle.
#[derive(Clone)]
pub struct TimesheetStore {
    pool: PgPool,
}

impl TimesheetStore {
    pub fn new(pool: PgPool) -> Self {
        TimesheetStore { pool }
    }

    /// Full-replace semantics in one transaction: clear both tables, write
    /// the column list, then the rows in order.
    pub async fn replace_all(&self, timesheet: &Timesheet) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM timesheet_rows")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM timesheet_columns")
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO timesheet_columns (singleton, columns) VALUES (TRUE, $1)")
            .bind(serde_json::to_value(&timesheet.columns).map_err(|e| {
                ApiError::Internal(format!("failed to encode column list: {e}"))
            })?)
            .execute(&mut *tx)
            .await?;

        for row in &timesheet.rows {
            sqlx::query("INSERT INTO timesheet_rows (cells) VALUES ($1)")
                .bind(serde_json::to_value(row).map_err(|e| {
                    ApiError::Internal(format!("failed to encode row: {e}"))
                })?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Read the whole dataset back. No upload yet means an empty timesheet.
    pub async fn fetch_all(&self) -> Result<Timesheet, ApiError> {
        let columns: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT columns FROM timesheet_columns WHERE singleton")
                .fetch_optional(&self.pool)
                .await?;

        let columns: Vec<String> = match columns {
            Some((value,)) => serde_json::from_value(value)
                .map_err(|e| ApiError::Internal(format!("corrupt column list: {e}")))?,
            None => return Ok(Timesheet::default()),
        };

        let raw_rows: Vec<(serde_json::Value,)> =
            sqlx::query_as("SELECT cells FROM timesheet_rows ORDER BY position")
                .fetch_all(&self.pool)
                .await?;

        let mut rows = Vec::with_capacity(raw_rows.len());
        for (value,) in raw_rows {
            rows.push(
                serde_json::from_value(value)
                    .map_err(|e| ApiError::Internal(format!("corrupt row: {e}")))?,
            );
        }

        Ok(Timesheet { columns, rows })
    }
}
