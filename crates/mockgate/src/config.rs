//! Configuration for the mock engine.

use hyper::header::HeaderName;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Discovery header carried by every request that belongs to a scope.
pub const DEFAULT_SCOPE_HEADER: &str = "mockgate-id";

/// What happens when a scope-keyed request matches none of its scope's rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedPolicy {
    /// Panic in the task that issued the request
    #[default]
    Panic,
    /// Complete the request with `MockError::Unmatched`
    Error,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockConfig {
    /// Name of the discovery header
    #[serde(default = "default_header")]
    pub header: String,

    #[serde(default)]
    pub on_unmatched: UnmatchedPolicy,

    /// Keep request bodies in the request log
    #[serde(default = "default_true")]
    pub record_bodies: bool,
}

fn default_header() -> String {
    DEFAULT_SCOPE_HEADER.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            header: default_header(),
            on_unmatched: UnmatchedPolicy::default(),
            record_bodies: true,
        }
    }
}

impl MockConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: MockConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.header.is_empty() {
            anyhow::bail!("Scope header name must not be empty");
        }
        if self.header.chars().any(|c| c.is_ascii_uppercase()) {
            anyhow::bail!(
                "Scope header name '{}' must be lowercase",
                self.header
            );
        }
        HeaderName::from_bytes(self.header.as_bytes()).map_err(|e| {
            anyhow::anyhow!("Scope header name '{}' is not a valid header: {e}", self.header)
        })?;
        Ok(())
    }

    /// Parsed discovery header name. Falls back to the default for an
    /// unvalidated, invalid name.
    pub fn header_name(&self) -> HeaderName {
        HeaderName::from_bytes(self.header.as_bytes())
            .unwrap_or_else(|_| HeaderName::from_static(DEFAULT_SCOPE_HEADER))
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn with_unmatched_policy(mut self, policy: UnmatchedPolicy) -> Self {
        self.on_unmatched = policy;
        self
    }

    pub fn with_record_bodies(mut self, record_bodies: bool) -> Self {
        self.record_bodies = record_bodies;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MockConfig::default();
        assert_eq!(config.header, "mockgate-id");
        assert_eq!(config.on_unmatched, UnmatchedPolicy::Panic);
        assert!(config.record_bodies);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = MockConfig::from_yaml("{}").unwrap();
        assert_eq!(config.header, DEFAULT_SCOPE_HEADER);
        assert_eq!(config.on_unmatched, UnmatchedPolicy::Panic);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
header: x-test-scope
on_unmatched: error
record_bodies: false
"#;
        let config = MockConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.header_name().as_str(), "x-test-scope");
        assert_eq!(config.on_unmatched, UnmatchedPolicy::Error);
        assert!(!config.record_bodies);
    }

    #[test]
    fn test_invalid_header_rejected() {
        assert!(MockConfig::from_yaml("header: \"\"").is_err());
        assert!(MockConfig::from_yaml("header: X-Scope").is_err());
        assert!(MockConfig::from_yaml("header: \"bad header\"").is_err());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(MockConfig::from_yaml("on_unmatched: ignore").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "header: scope-id").unwrap();

        let config = MockConfig::from_file(file.path()).unwrap();
        assert_eq!(config.header, "scope-id");
        assert!(MockConfig::from_file("/nonexistent/mockgate.yaml").is_err());
    }
}
