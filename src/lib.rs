//! URL phishing classification: TF-IDF n-gram features, a pluggable
//! classifier (logistic regression or random forest), and a deterministic
//! domain-allowlist override.
//!
//! The binary (`phishscore`) is a thin wrapper around this library: training
//! and evaluation produce/consume a serialized [`artifact::ModelArtifact`],
//! and serving loads that artifact once and scores single URLs or batches
//! against a caller-supplied threshold and [`domain::Allowlist`].
//!
//! The artifact is read-only after load and can be shared immutably across
//! concurrent callers; scoring is pure and stateless after fit.

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod evaluate;
pub mod forest;
pub mod logistic;
pub mod predict;
pub mod train;
pub mod vectorizer;

pub use artifact::ModelArtifact;
pub use classifier::{Classifier, ClassifierKind};
pub use domain::{registrable_domain, Allowlist};
pub use error::AppError;
pub use evaluate::{evaluate, Evaluation};
pub use predict::{decide, predict_batch, PredictionRecord};
pub use train::{to_num_label, train, LabeledRow, TrainReport};
