use std::path::Path;

use crate::error::AppError;
use crate::train::LabeledRow;

/// Read a fixed-schema labeled CSV (`url`, `label` columns, any order,
/// other columns ignored).
///
/// Missing columns are a fatal configuration error; missing cells in a row
/// are not — they come back as `None` and surface as drop counts during
/// training or evaluation.
pub fn load_labeled_csv(path: &Path) -> Result<Vec<LabeledRow>, AppError> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    let url_idx = headers
        .iter()
        .position(|h| h == "url")
        .ok_or_else(|| AppError::MissingColumn("url".to_string()))?;
    let label_idx = headers
        .iter()
        .position(|h| h == "label")
        .ok_or_else(|| AppError::MissingColumn("label".to_string()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(LabeledRow {
            url: non_empty(record.get(url_idx)),
            label: non_empty(record.get(label_idx)),
        });
    }
    Ok(rows)
}

fn non_empty(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_labeled_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "label,url,extra").unwrap();
        writeln!(file, "phish,http://a.test/x,1").unwrap();
        writeln!(file, "benign,https://example.com,2").unwrap();
        writeln!(file, ",http://nolabel.test,3").unwrap();
        drop(file);

        let rows = load_labeled_csv(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].url.as_deref(), Some("http://a.test/x"));
        assert_eq!(rows[0].label.as_deref(), Some("phish"));
        assert_eq!(rows[2].label, None);
    }

    #[test]
    fn test_missing_label_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "url\nhttp://a.test\n").unwrap();

        let err = load_labeled_csv(&path).unwrap_err();
        assert!(matches!(err, AppError::MissingColumn(ref c) if c == "label"));
    }
}
