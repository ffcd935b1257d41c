use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{debug, info};
use url::Url;

use crate::error::AppError;

/// Sentinel returned when no registrable domain can be derived from the input.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Derive the registrable domain (eTLD+1) of a URL or bare host.
///
/// Uses public-suffix-list semantics, so multi-part suffixes like "co.uk"
/// are handled. The result is lower-cased. Malformed input never fails;
/// it maps to `"unknown"`.
pub fn registrable_domain(raw: &str) -> String {
    let host = match extract_host(raw) {
        Some(h) => h,
        None => return UNKNOWN_DOMAIN.to_string(),
    };

    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return UNKNOWN_DOMAIN.to_string();
    }

    match psl::domain_str(&host) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => UNKNOWN_DOMAIN.to_string(),
    }
}

fn extract_host(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = Url::parse(trimmed) {
        if let Some(h) = parsed.host_str() {
            return Some(h.to_string());
        }
    }

    // Bare hosts and scheme-less URLs ("example.com/login") still need a
    // domain, so retry with a synthetic scheme.
    if !trimmed.contains("://") {
        if let Ok(parsed) = Url::parse(&format!("http://{trimmed}")) {
            if let Some(h) = parsed.host_str() {
                return Some(h.to_string());
            }
        }
    }

    None
}

/// Immutable set of trusted registrable domains.
///
/// A match forces a benign decision regardless of model output. Allowlisting
/// is opt-in: an absent source yields an empty set, while an explicitly
/// configured source that cannot be read is a fatal configuration error.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    domains: HashSet<String>,
}

impl Allowlist {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from an optional file path: one domain per line, blank lines and
    /// `#` comments skipped, entries lower-cased, duplicates collapsed.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let path = match path {
            Some(p) => p,
            None => return Ok(Self::empty()),
        };

        let content = fs::read_to_string(path)
            .map_err(|_| AppError::MissingAllowlist(path.display().to_string()))?;

        let domains: HashSet<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_ascii_lowercase)
            .collect();

        info!(
            "Loaded allowlist from {}: {} domains",
            path.display(),
            domains.len()
        );
        Ok(Self { domains })
    }

    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.into().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn contains(&self, domain: &str) -> bool {
        let hit = self.domains.contains(domain);
        if hit {
            debug!("Allowlist hit for domain: {}", domain);
        }
        hit
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_registrable_domain_simple() {
        assert_eq!(registrable_domain("https://example.com/login"), "example.com");
        assert_eq!(registrable_domain("http://www.example.com"), "example.com");
    }

    #[test]
    fn test_registrable_domain_multi_part_suffix() {
        assert_eq!(
            registrable_domain("https://www.example.co.uk/path"),
            "example.co.uk"
        );
    }

    #[test]
    fn test_registrable_domain_case_insensitive() {
        assert_eq!(registrable_domain("https://WWW.Example.COM"), "example.com");
    }

    #[test]
    fn test_registrable_domain_bare_host() {
        assert_eq!(registrable_domain("example.com"), "example.com");
        assert_eq!(registrable_domain("sub.example.com/login"), "example.com");
    }

    #[test]
    fn test_registrable_domain_malformed() {
        assert_eq!(registrable_domain("not a url"), UNKNOWN_DOMAIN);
        assert_eq!(registrable_domain(""), UNKNOWN_DOMAIN);
        assert_eq!(registrable_domain("   "), UNKNOWN_DOMAIN);
        assert_eq!(registrable_domain("http://"), UNKNOWN_DOMAIN);
    }

    #[test]
    fn test_allowlist_absent_source_is_empty() {
        let allow = Allowlist::load(None).unwrap();
        assert!(allow.is_empty());
    }

    #[test]
    fn test_allowlist_missing_file_is_fatal() {
        let err = Allowlist::load(Some(Path::new("/nonexistent/allow.txt"))).unwrap_err();
        assert!(matches!(err, AppError::MissingAllowlist(_)));
    }

    #[test]
    fn test_allowlist_parsing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# trusted domains").unwrap();
        writeln!(file, "Example.com").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "example.com").unwrap();
        writeln!(file, "other.org").unwrap();
        file.flush().unwrap();

        let allow = Allowlist::load(Some(file.path())).unwrap();
        assert_eq!(allow.len(), 2);
        assert!(allow.contains("example.com"));
        assert!(allow.contains("other.org"));
        assert!(!allow.contains("# trusted domains"));
    }
}
