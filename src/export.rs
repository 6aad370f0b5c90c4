//! CSV export of backend records.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::notify::Notifier;

/// A record as the backend sent it, keys in their original order.
pub type Record = Map<String, Value>;

/// Errors raised while writing an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The file could not be written.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Target file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// File name used when the user does not pick one.
#[must_use]
pub fn default_file_name(date: NaiveDate) -> String {
    format!("clients_export_{}.csv", date.format("%Y-%m-%d"))
}

/// Renders records as CSV.
///
/// The header is the key list of the first record. Strings are quoted with
/// embedded quotes doubled, `null` and missing keys are empty, and any other
/// value is written as JSON. Returns `None` when there is nothing to write.
#[must_use]
pub fn to_csv(rows: &[Record]) -> Option<String> {
    let first = rows.first()?;
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|key| row.get(*key).map(cell).unwrap_or_default())
            .collect();
        lines.push(cells.join(","));
    }
    Some(lines.join("\n"))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        other => other.to_string(),
    }
}

/// Writes `rows` to `path` as CSV.
///
/// With no rows a warning is shown and no file is created.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn export_csv(
    rows: &[Record],
    path: &Path,
    notifier: &dyn Notifier,
) -> Result<Option<PathBuf>, ExportError> {
    let Some(content) = to_csv(rows) else {
        notifier.warning("No data to export");
        return Ok(None);
    };

    let io = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    std::fs::write(path, content).map_err(io)?;

    tracing::info!(path = %path.display(), rows = rows.len(), "export written");
    notifier.success("Clients exported successfully");
    Ok(Some(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::notify::{Level, testing::RecordingNotifier};

    fn records(value: Value) -> Vec<Record> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn quotes_strings_and_keeps_other_values_raw() {
        let rows = records(json!([
            {"changeID": 1, "clientName": "O\"Brien, Pat", "reviewed": false, "oldValue": null},
            {"changeID": 2, "clientName": "Smith", "reviewed": true},
        ]));

        let csv = to_csv(&rows).unwrap();

        assert_eq!(
            csv,
            "changeID,clientName,reviewed,oldValue\n\
             1,\"O\"\"Brien, Pat\",false,\n\
             2,\"Smith\",true,"
        );
    }

    #[test]
    fn zero_rows_warn_and_write_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.csv");
        let notifier = RecordingNotifier::default();

        let written = export_csv(&[], &path, &notifier).unwrap();

        assert_eq!(written, None);
        assert!(!path.exists());
        assert_eq!(notifier.last(), Some((Level::Warning, "No data to export".into())));
    }

    #[test]
    fn writes_file_and_reports_success() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("exports").join("changes.csv");
        let notifier = RecordingNotifier::default();
        let rows = records(json!([{"clientID": 4}]));

        let written = export_csv(&rows, &path, &notifier).unwrap();

        assert_eq!(written.as_deref(), Some(path.as_path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "clientID\n4");
        assert_eq!(notifier.last().map(|(level, _)| level), Some(Level::Success));
    }

    #[test]
    fn default_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(default_file_name(date), "clients_export_2024-03-09.csv");
    }
}
