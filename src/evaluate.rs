use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::artifact::ModelArtifact;
use crate::error::AppError;
use crate::train::{to_num_label, LabeledRow};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassReport {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Metrics for a fitted artifact against held-out labeled data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub accuracy: f64,
    /// Omitted (not errored) when the holdout contains a single class.
    pub roc_auc: Option<f64>,
    pub confusion: ConfusionMatrix,
    pub benign: ClassReport,
    pub phish: ClassReport,
    pub rows_used: usize,
    pub rows_dropped: usize,
}

/// Score an artifact against a labeled holdout.
///
/// Labels are normalized with the exact same mapping the training pipeline
/// uses; rows that fail it are dropped and counted, never guessed. Scoring
/// runs once over the whole holdout.
pub fn evaluate(
    artifact: &ModelArtifact,
    rows: &[LabeledRow],
    threshold: f64,
) -> Result<Evaluation, AppError> {
    let mut urls: Vec<String> = Vec::with_capacity(rows.len());
    let mut labels: Vec<u8> = Vec::with_capacity(rows.len());

    for row in rows {
        if let (Some(url), Some(raw)) = (&row.url, &row.label) {
            if let Some(label) = to_num_label(raw) {
                urls.push(url.clone());
                labels.push(label);
            }
        }
    }

    let dropped = rows.len() - urls.len();
    if dropped > 0 {
        warn!("Dropped {} of {} holdout rows", dropped, rows.len());
    }
    if urls.is_empty() {
        return Err(AppError::EmptyDataset {
            seen: rows.len(),
            dropped,
        });
    }

    let probabilities = artifact.phish_probabilities(&urls)?;
    let predictions: Vec<u8> = probabilities
        .iter()
        .map(|&p| (p >= threshold) as u8)
        .collect();

    let mut confusion = ConfusionMatrix::default();
    for (&truth, &pred) in labels.iter().zip(&predictions) {
        match (truth, pred) {
            (0, 0) => confusion.true_negative += 1,
            (0, 1) => confusion.false_positive += 1,
            (1, 0) => confusion.false_negative += 1,
            (1, 1) => confusion.true_positive += 1,
            _ => unreachable!("labels are binary"),
        }
    }

    let n = labels.len();
    let accuracy = (confusion.true_negative + confusion.true_positive) as f64 / n as f64;

    let benign = class_report(
        confusion.true_negative,
        confusion.false_negative,
        confusion.false_positive,
        labels.iter().filter(|&&l| l == 0).count(),
    );
    let phish = class_report(
        confusion.true_positive,
        confusion.false_positive,
        confusion.false_negative,
        labels.iter().filter(|&&l| l == 1).count(),
    );

    Ok(Evaluation {
        accuracy,
        roc_auc: roc_auc(&labels, &probabilities),
        confusion,
        benign,
        phish,
        rows_used: n,
        rows_dropped: dropped,
    })
}

fn class_report(
    true_hits: usize,
    predicted_extra: usize,
    missed: usize,
    support: usize,
) -> ClassReport {
    let predicted = true_hits + predicted_extra;
    let actual = true_hits + missed;

    let precision = if predicted > 0 {
        true_hits as f64 / predicted as f64
    } else {
        0.0
    };
    let recall = if actual > 0 {
        true_hits as f64 / actual as f64
    } else {
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ClassReport {
        precision,
        recall,
        f1,
        support,
    }
}

/// Area under the ROC curve via the rank-sum (Mann-Whitney) formulation,
/// with midranks for tied scores. `None` when the holdout is single-class.
fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let midrank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = midrank;
        }
        i = j + 1;
    }

    let rank_sum_pos: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(&l, _)| l == 1)
        .map(|(_, &r)| r)
        .sum();

    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy: {:.4}", self.accuracy)?;
        match self.roc_auc {
            Some(auc) => writeln!(f, "ROC AUC:  {:.4}", auc)?,
            None => writeln!(f, "ROC AUC:  n/a (single-class holdout)")?,
        }
        writeln!(f, "Confusion matrix (rows = truth, cols = predicted):")?;
        writeln!(
            f,
            "          benign  phish\n  benign  {:>6}  {:>5}\n  phish   {:>6}  {:>5}",
            self.confusion.true_negative,
            self.confusion.false_positive,
            self.confusion.false_negative,
            self.confusion.true_positive
        )?;
        writeln!(f, "          precision  recall      f1  support")?;
        for (name, report) in [("benign", &self.benign), ("phish", &self.phish)] {
            writeln!(
                f,
                "  {:<8}    {:.3}   {:.3}   {:.3}  {:>7}",
                name, report.precision, report.recall, report.f1, report.support
            )?;
        }
        Ok(())
    }
}
