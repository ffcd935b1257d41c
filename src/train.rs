use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifact::{ArtifactMetadata, ModelArtifact};
use crate::classifier::{Classifier, ClassifierKind};
use crate::error::AppError;
use crate::vectorizer::TfidfVectorizer;

/// One raw training row as read from a labeled CSV. Either field may be
/// missing; such rows are dropped (and counted) before fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledRow {
    pub url: Option<String>,
    pub label: Option<String>,
}

/// Map a raw label literal onto {0, 1}.
///
/// The same mapping is used by training and evaluation; anything outside
/// the known synonym sets is unmapped and dropped rather than guessed,
/// since training on ambiguous labels silently corrupts the model.
pub fn to_num_label(raw: &str) -> Option<u8> {
    match raw.trim().to_lowercase().as_str() {
        "phish" | "phishing" | "malicious" | "spam" | "1" => Some(1),
        "benign" | "legit" | "legitimate" | "good" | "safe" | "0" => Some(0),
        _ => None,
    }
}

/// Side report of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub rows_seen: usize,
    pub rows_used: usize,
    pub dropped_missing: usize,
    pub dropped_unmapped: usize,
    pub benign_count: usize,
    pub phish_count: usize,
}

/// Fit the vectorizer and the selected classifier jointly on labeled data.
///
/// Rows with a missing URL or label are dropped, as are rows whose label
/// does not map onto {0, 1}; both kinds are aggregated into the report
/// rather than reported per row. An empty remainder is fatal.
pub fn train(
    rows: &[LabeledRow],
    kind: ClassifierKind,
) -> Result<(ModelArtifact, TrainReport), AppError> {
    let mut urls: Vec<String> = Vec::with_capacity(rows.len());
    let mut labels: Vec<u8> = Vec::with_capacity(rows.len());
    let mut dropped_missing = 0usize;
    let mut dropped_unmapped = 0usize;

    for row in rows {
        let (url, raw_label) = match (&row.url, &row.label) {
            (Some(u), Some(l)) => (u, l),
            _ => {
                dropped_missing += 1;
                continue;
            }
        };
        match to_num_label(raw_label) {
            Some(label) => {
                urls.push(url.clone());
                labels.push(label);
            }
            None => {
                dropped_unmapped += 1;
            }
        }
    }

    let dropped = dropped_missing + dropped_unmapped;
    if dropped > 0 {
        warn!(
            "Dropped {} of {} training rows ({} missing url/label, {} unmapped labels)",
            dropped,
            rows.len(),
            dropped_missing,
            dropped_unmapped
        );
    }
    if urls.is_empty() {
        return Err(AppError::EmptyDataset {
            seen: rows.len(),
            dropped,
        });
    }

    let phish_count = labels.iter().filter(|&&l| l == 1).count();
    let report = TrainReport {
        rows_seen: rows.len(),
        rows_used: urls.len(),
        dropped_missing,
        dropped_unmapped,
        benign_count: urls.len() - phish_count,
        phish_count,
    };

    info!(
        "Training {} classifier on {} rows ({} phish / {} benign)",
        kind, report.rows_used, report.phish_count, report.benign_count
    );

    let mut vectorizer = TfidfVectorizer::new();
    let x = vectorizer.fit_transform(&urls);

    let mut classifier = Classifier::new(kind);
    classifier.fit(&x, &labels);

    let metadata = ArtifactMetadata {
        kind,
        trained_at: Utc::now(),
        training_rows: report.rows_used,
        vocabulary_size: vectorizer.n_features(),
    };

    Ok((
        ModelArtifact {
            vectorizer,
            classifier,
            metadata,
        },
        report,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(url: &str, label: &str) -> LabeledRow {
        LabeledRow {
            url: Some(url.to_string()),
            label: Some(label.to_string()),
        }
    }

    #[test]
    fn test_label_synonyms() {
        assert_eq!(to_num_label("Phishing"), Some(1));
        assert_eq!(to_num_label("malicious"), Some(1));
        assert_eq!(to_num_label("spam"), Some(1));
        assert_eq!(to_num_label("1"), Some(1));
        assert_eq!(to_num_label("Legit"), Some(0));
        assert_eq!(to_num_label("SAFE"), Some(0));
        assert_eq!(to_num_label("0"), Some(0));
        assert_eq!(to_num_label("unsure"), None);
        assert_eq!(to_num_label(""), None);
    }

    #[test]
    fn test_dropped_rows_are_counted() {
        let rows = vec![
            row("http://phish.test/a", "phish"),
            row("https://example.com/", "benign"),
            row("http://odd.test/", "unsure"),
            LabeledRow {
                url: None,
                label: Some("phish".to_string()),
            },
            LabeledRow {
                url: Some("http://nolabel.test/".to_string()),
                label: None,
            },
        ];

        let (artifact, report) = train(&rows, ClassifierKind::Logreg).unwrap();
        assert_eq!(report.rows_seen, 5);
        assert_eq!(report.rows_used, 2);
        assert_eq!(report.dropped_missing, 2);
        assert_eq!(report.dropped_unmapped, 1);
        assert_eq!(report.phish_count, 1);
        assert_eq!(report.benign_count, 1);
        assert_eq!(artifact.metadata.training_rows, 2);
    }

    #[test]
    fn test_all_rows_dropped_is_fatal() {
        let rows = vec![row("http://odd.test/", "unsure"), row("http://x.test/", "maybe")];
        let err = train(&rows, ClassifierKind::Logreg).unwrap_err();
        assert!(matches!(err, AppError::EmptyDataset { seen: 2, dropped: 2 }));
    }

    #[test]
    fn test_train_rf_variant() {
        let rows = vec![
            row("http://secure-login.verify.test/a", "phish"),
            row("http://account-update.confirm.test/b", "phish"),
            row("https://example.com/docs", "benign"),
            row("https://example.org/blog", "benign"),
        ];
        let (artifact, report) = train(&rows, ClassifierKind::Rf).unwrap();
        assert_eq!(artifact.metadata.kind, ClassifierKind::Rf);
        assert_eq!(report.rows_used, 4);

        let probs = artifact
            .phish_probabilities(&["http://secure-login.verify.test/a".to_string()])
            .unwrap();
        assert!((0.0..=1.0).contains(&probs[0]));
    }
}
