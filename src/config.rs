use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL_PATH: &str = "models/phish_model.json";
pub const DEFAULT_THRESHOLD: f64 = 0.50;

/// Process-level defaults, overridable through the environment.
///
/// CLI flags take precedence over these; the environment takes precedence
/// over the compiled-in defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub model_path: PathBuf,
    pub threshold: f64,
    pub allowlist_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        let model_path = env::var("PHISHSCORE_MODEL")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH));

        let threshold = env::var("PHISHSCORE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_THRESHOLD);

        let allowlist_path = env::var("PHISHSCORE_ALLOWLIST").ok().map(PathBuf::from);

        Config {
            model_path,
            threshold,
            allowlist_path,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            threshold: DEFAULT_THRESHOLD,
            allowlist_path: None,
        }
    }
}
