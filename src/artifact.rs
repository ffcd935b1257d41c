use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{phish_probabilities, Classifier, ClassifierKind};
use crate::domain::Allowlist;
use crate::error::AppError;
use crate::predict::{predict_batch, PredictionRecord};
use crate::vectorizer::TfidfVectorizer;

/// The serialized bundle of fitted vectorizer + classifier.
///
/// Created once by the training pipeline and consumed read-only by serving
/// and evaluation. The vectorizer's vocabulary travels inside the artifact,
/// which is what keeps feature semantics identical between training and
/// inference: the artifact is never refit after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub vectorizer: TfidfVectorizer,
    pub classifier: Classifier,
    pub metadata: ArtifactMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub kind: ClassifierKind,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub vocabulary_size: usize,
}

impl ModelArtifact {
    /// Load an artifact from disk. All-or-nothing: a missing file or a
    /// partially written / undecodable one is an explicit fatal error,
    /// never a degraded model.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::MissingArtifact(path.display().to_string()));
        }
        let content = fs::read_to_string(path).map_err(|e| AppError::ArtifactLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let artifact: ModelArtifact =
            serde_json::from_str(&content).map_err(|e| AppError::ArtifactLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        info!(
            "Loaded model artifact from {}: {} classifier, {} vocabulary terms",
            path.display(),
            artifact.metadata.kind,
            artifact.metadata.vocabulary_size
        );
        Ok(artifact)
    }

    /// Save atomically: serialize to a temp file in the destination
    /// directory, then rename over the target. A concurrent reader never
    /// observes a partially written artifact.
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string(self)?;
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;

        info!("Saved model artifact to {}", path.display());
        Ok(())
    }

    /// Normalized phish probability for each URL, vectorized over the whole
    /// batch against the frozen vocabulary.
    pub fn phish_probabilities(&self, urls: &[String]) -> Result<Vec<f64>, AppError> {
        let x = self.vectorizer.transform(urls);
        phish_probabilities(&self.classifier, &x)
    }

    /// Score a batch of URLs and apply the threshold + allowlist decision,
    /// order-preserving. This is the library's main serving entry point.
    pub fn predict(
        &self,
        urls: &[String],
        threshold: f64,
        allowlist: &Allowlist,
    ) -> Result<Vec<PredictionRecord>, AppError> {
        predict_batch(self, urls, threshold, allowlist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::{train, LabeledRow};

    fn fitted_artifact() -> ModelArtifact {
        let rows: Vec<LabeledRow> = vec![
            ("http://secure-login.bank-verify.test/account", "phish"),
            ("http://paypa1-confirm.test/update", "phish"),
            ("http://free-prize-winner.test/claim", "phish"),
            ("https://example.com/about", "benign"),
            ("https://docs.example.org/guide", "benign"),
            ("https://news.example.net/story", "benign"),
        ]
        .into_iter()
        .map(|(url, label)| LabeledRow {
            url: Some(url.to_string()),
            label: Some(label.to_string()),
        })
        .collect();
        let (artifact, _) = train(&rows, ClassifierKind::Logreg).unwrap();
        artifact
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let artifact = fitted_artifact();
        artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        let urls = vec!["http://secure-login.bank-verify.test/account".to_string()];
        let before = artifact.phish_probabilities(&urls).unwrap();
        let after = loaded.phish_probabilities(&urls).unwrap();
        assert_eq!(before, after);

        // No temp file left behind after the rename.
        assert!(!dir.path().join("model.json.tmp").exists());
    }

    #[test]
    fn test_load_missing_artifact_is_fatal() {
        let err = ModelArtifact::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, AppError::MissingArtifact(_)));
    }

    #[test]
    fn test_load_corrupt_artifact_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(err, AppError::ArtifactLoad { .. }));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models/nested/model.json");

        fitted_artifact().save(&path).unwrap();
        assert!(path.exists());
    }
}
