use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::forest::RandomForest;
use crate::logistic::{sigmoid, LogisticRegression};
use crate::vectorizer::SparseVector;

/// Selector for the classifier variant, chosen at training time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    Logreg,
    Rf,
}

impl FromStr for ClassifierKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "logreg" => Ok(ClassifierKind::Logreg),
            "rf" => Ok(ClassifierKind::Rf),
            other => Err(AppError::UnknownClassifier(other.to_string())),
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierKind::Logreg => write!(f, "logreg"),
            ClassifierKind::Rf => write!(f, "rf"),
        }
    }
}

/// Polymorphic scoring component.
///
/// Each variant advertises exactly one raw output representation through
/// `class_probability` / `margin`; the dispatch is an explicit tagged enum,
/// not runtime attribute probing. `phish_probabilities` selects between the
/// two deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Classifier {
    Logistic(LogisticRegression),
    Forest(RandomForest),
}

impl Classifier {
    pub fn new(kind: ClassifierKind) -> Self {
        match kind {
            ClassifierKind::Logreg => Classifier::Logistic(LogisticRegression::new()),
            ClassifierKind::Rf => Classifier::Forest(RandomForest::new()),
        }
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            Classifier::Logistic(_) => ClassifierKind::Logreg,
            Classifier::Forest(_) => ClassifierKind::Rf,
        }
    }

    pub fn fit(&mut self, x: &[SparseVector], y: &[u8]) {
        match self {
            Classifier::Logistic(clf) => clf.fit(x, y),
            Classifier::Forest(clf) => clf.fit(x, y),
        }
    }

    /// Native per-class probability columns, when the variant has them.
    pub fn class_probability(&self, x: &[SparseVector]) -> Option<Vec<Vec<f64>>> {
        match self {
            Classifier::Forest(clf) => Some(clf.class_probability(x)),
            Classifier::Logistic(_) => None,
        }
    }

    /// Raw unbounded decision margins, when the variant has them.
    pub fn margin(&self, x: &[SparseVector]) -> Option<Vec<f64>> {
        match self {
            Classifier::Logistic(clf) => Some(clf.margins(x)),
            Classifier::Forest(_) => None,
        }
    }
}

/// Normalize classifier output to a class-1 (phish) probability in [0, 1].
///
/// Native class probabilities are used directly after checking the binary
/// invariant: anything other than exactly two class columns rejects the
/// artifact. Margin-only variants go through the logistic squash. A variant
/// exposing neither representation is a configuration error, never a silent
/// default.
pub fn phish_probabilities(
    classifier: &Classifier,
    x: &[SparseVector],
) -> Result<Vec<f64>, AppError> {
    if let Some(rows) = classifier.class_probability(x) {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != 2 {
                return Err(AppError::NonBinaryClassifier(row.len()));
            }
            out.push(row[1]);
        }
        return Ok(out);
    }

    if let Some(margins) = classifier.margin(x) {
        return Ok(margins.into_iter().map(sigmoid).collect());
    }

    Err(AppError::NoScoringOutput)
}
