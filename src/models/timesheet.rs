use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// How much of the dataset goes into a model prompt. Full-data inclusion is
/// deliberately not attempted; the preview bounds the prompt size.
pub const PREVIEW_MAX_ROWS: usize = 20;
pub const PREVIEW_MAX_COLS: usize = 12;

/// The current uploaded timesheet as a rectangle of strings. Uploads replace
/// the whole dataset; there is no merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timesheet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Timesheet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse an uploaded CSV file. The first record is the header row; every
    /// data row is padded or cut to the header width so the result is always
    /// rectangular.
    pub fn from_csv(data: &[u8]) -> Result<Timesheet, ApiError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| ApiError::Internal(format!("Error processing file: {e}")))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if columns.is_empty() {
            return Err(ApiError::Internal(
                "Error processing file: no header row".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| ApiError::Internal(format!("Error processing file: {e}")))?;
            let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Timesheet { columns, rows })
    }

    /// Render a bounded, pipe-separated preview of the dataset for prompt
    /// assembly, noting whatever was cut off.
    pub fn preview(&self) -> String {
        let col_count = self.columns.len().min(PREVIEW_MAX_COLS);
        let row_count = self.rows.len().min(PREVIEW_MAX_ROWS);

        let mut out = String::new();
        out.push_str(&self.columns[..col_count].join(" | "));
        out.push('\n');

        for row in &self.rows[..row_count] {
            let shown = row.iter().take(col_count).cloned().collect::<Vec<_>>();
            out.push_str(&shown.join(" | "));
            out.push('\n');
        }

        if self.columns.len() > col_count {
            out.push_str(&format!(
                "({} more columns not shown)\n",
                self.columns.len() - col_count
            ));
        }
        if self.rows.len() > row_count {
            out.push_str(&format!(
                "({} more rows not shown, {} rows total)\n",
                self.rows.len() - row_count,
                self.rows.len()
            ));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_rows() {
        let csv = b"employee,hours,project\nalice,8,Apollo\nbob,6,Hermes\n";
        let sheet = Timesheet::from_csv(csv).unwrap();
        assert_eq!(sheet.columns, vec!["employee", "hours", "project"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0], vec!["alice", "8", "Apollo"]);
        assert!(!sheet.is_empty());
    }

    #[test]
    fn ragged_rows_are_squared_to_the_header() {
        let csv = b"a,b,c\n1,2\n1,2,3,4\n";
        let sheet = Timesheet::from_csv(csv).unwrap();
        assert_eq!(sheet.rows[0], vec!["1", "2", ""]);
        assert_eq!(sheet.rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn header_only_file_is_an_empty_dataset() {
        let sheet = Timesheet::from_csv(b"employee,hours\n").unwrap();
        assert!(sheet.is_empty());
    }

    #[test]
    fn preview_is_bounded() {
        let columns: Vec<String> = (0..30).map(|i| format!("col{i}")).collect();
        let rows: Vec<Vec<String>> = (0..100)
            .map(|r| (0..30).map(|c| format!("{r}:{c}")).collect())
            .collect();
        let sheet = Timesheet { columns, rows };

        let preview = sheet.preview();
        let data_lines = preview
            .lines()
            .filter(|l| !l.starts_with('('))
            .count();
        // Header plus the bounded row window.
        assert_eq!(data_lines, 1 + PREVIEW_MAX_ROWS);
        assert!(preview.contains("18 more columns not shown"));
        assert!(preview.contains("80 more rows not shown, 100 rows total"));
        assert!(!preview.contains("col29"));
    }

    #[test]
    fn small_sheet_previews_in_full() {
        let sheet = Timesheet {
            columns: vec!["a".into(), "b".into()],
            rows: vec![vec!["1".into(), "2".into()]],
        };
        let preview = sheet.preview();
        assert_eq!(preview, "a | b\n1 | 2\n");
    }
}
