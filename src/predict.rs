use std::fs::File;
use std::path::Path;

use csv::{StringRecord, Writer};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifact::ModelArtifact;
use crate::domain::{registrable_domain, Allowlist};
use crate::error::AppError;

/// One scored URL. Immutable once produced.
///
/// Overridden records keep the raw model probability for audit; the
/// override only forces the label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub url: String,
    pub domain: String,
    pub probability: f64,
    pub predicted_label: u8,
    pub overridden: bool,
}

impl PredictionRecord {
    pub fn label_str(&self) -> &'static str {
        if self.predicted_label == 1 {
            "phish"
        } else {
            "benign"
        }
    }
}

/// Combine a normalized probability, the threshold, and the allowlist into
/// a final record.
///
/// An allowlisted registrable domain is an absolute override to benign,
/// regardless of probability. Otherwise the label is 1 iff `probability >=
/// threshold` (boundary inclusive).
pub fn decide(
    url: &str,
    probability: f64,
    threshold: f64,
    allowlist: &Allowlist,
) -> PredictionRecord {
    let domain = registrable_domain(url);

    if allowlist.contains(&domain) {
        return PredictionRecord {
            url: url.to_string(),
            domain,
            probability,
            predicted_label: 0,
            overridden: true,
        };
    }

    PredictionRecord {
        url: url.to_string(),
        domain,
        probability,
        predicted_label: (probability >= threshold) as u8,
        overridden: false,
    }
}

/// Score a batch of URLs, order-preserving: record `i` corresponds to input
/// `i`. Vectorization and scoring run once over the whole batch; the
/// per-item decision is applied afterwards. A malformed URL degrades to
/// domain `"unknown"` and is still scored on whatever features it yields.
pub fn predict_batch(
    artifact: &ModelArtifact,
    urls: &[String],
    threshold: f64,
    allowlist: &Allowlist,
) -> Result<Vec<PredictionRecord>, AppError> {
    let probabilities = artifact.phish_probabilities(urls)?;

    Ok(urls
        .iter()
        .zip(probabilities)
        .map(|(url, p)| decide(url, p, threshold, allowlist))
        .collect())
}

/// CSV batch mode: requires a `url` column, appends `domain`, `prob_phish`,
/// `pred` and `pred_label` columns, and preserves row order and every other
/// input column unchanged. Without an output path the first rows are
/// printed to stdout.
pub fn predict_csv(
    artifact: &ModelArtifact,
    input: &Path,
    output: Option<&Path>,
    threshold: f64,
    allowlist: &Allowlist,
) -> Result<(), AppError> {
    let file = File::open(input)?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader.headers()?.clone();
    let url_idx = headers
        .iter()
        .position(|h| h == "url")
        .ok_or_else(|| AppError::MissingColumn("url".to_string()))?;

    let rows: Vec<StringRecord> = reader.records().collect::<Result<_, _>>()?;
    let urls: Vec<String> = rows
        .iter()
        .map(|r| r.get(url_idx).unwrap_or("").to_string())
        .collect();

    let records = predict_batch(artifact, &urls, threshold, allowlist)?;

    let mut out_headers = headers.clone();
    for extra in ["domain", "prob_phish", "pred", "pred_label"] {
        out_headers.push_field(extra);
    }

    match output {
        Some(path) => {
            let mut writer = Writer::from_path(path)?;
            write_rows(&mut writer, &out_headers, &rows, &records)?;
            writer.flush().map_err(AppError::Io)?;
            info!("Saved predictions to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = Writer::from_writer(stdout.lock());
            let preview = rows.len().min(10);
            write_rows(&mut writer, &out_headers, &rows[..preview], &records[..preview])?;
            writer.flush().map_err(AppError::Io)?;
        }
    }

    Ok(())
}

fn write_rows<W: std::io::Write>(
    writer: &mut Writer<W>,
    headers: &StringRecord,
    rows: &[StringRecord],
    records: &[PredictionRecord],
) -> Result<(), AppError> {
    writer.write_record(headers)?;
    for (row, rec) in rows.iter().zip(records) {
        let mut out = row.clone();
        out.push_field(&rec.domain);
        out.push_field(&format!("{:.6}", rec.probability));
        out.push_field(&rec.predicted_label.to_string());
        out.push_field(rec.label_str());
        writer.write_record(&out)?;
    }
    Ok(())
}
