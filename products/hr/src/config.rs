use std::str::FromStr;

use platform_cache::CacheSettings;
use url::Url;

use crate::error::{DirectoryError, DirectoryResult};

/// Office endpoints serving the roster.
pub const DEFAULT_SOURCES: [&str; 2] = [
    "http://tallinn.jobapp.aw.ee/employee_list",
    "http://tartu.jobapp.aw.ee/employee_list",
];

/// What to do when some sources answer and others fail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PartialFailurePolicy {
    /// Any failed source fails the refresh; nothing is decoded.
    #[default]
    DiscardAll,
    /// Decode whatever arrived as long as at least one source answered.
    UseSuccessful,
}

impl FromStr for PartialFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "discard" | "discard-all" => Ok(Self::DiscardAll),
            "use-successful" | "partial" => Ok(Self::UseSuccessful),
            other => Err(format!("unknown partial failure policy {other:?}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    pub sources: Vec<Url>,
    pub partial_failure: PartialFailurePolicy,
    /// `None` runs without a persistent cache.
    pub cache: Option<CacheSettings>,
}

impl DirectoryConfig {
    pub fn new(sources: Vec<Url>) -> Self {
        Self {
            sources,
            partial_failure: PartialFailurePolicy::default(),
            cache: Some(CacheSettings::default()),
        }
    }

    pub fn with_defaults() -> DirectoryResult<Self> {
        Ok(Self::new(Self::parse_sources(&DEFAULT_SOURCES)?))
    }

    pub fn with_partial_failure(mut self, policy: PartialFailurePolicy) -> Self {
        self.partial_failure = policy;
        self
    }

    pub fn with_cache(mut self, cache: Option<CacheSettings>) -> Self {
        self.cache = cache;
        self
    }

    pub fn parse_sources<S: AsRef<str>>(raw: &[S]) -> DirectoryResult<Vec<Url>> {
        raw.iter()
            .map(|value| {
                let value = value.as_ref().trim();
                Url::parse(value).map_err(|source| DirectoryError::InvalidSource {
                    url: value.to_string(),
                    source,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sources_parse() {
        let config = DirectoryConfig::with_defaults().unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.partial_failure, PartialFailurePolicy::DiscardAll);
    }

    #[test]
    fn malformed_source_is_reported() {
        let err = DirectoryConfig::parse_sources(&["http://ok.example/list", "not a url"])
            .unwrap_err();
        match err {
            DirectoryError::InvalidSource { url, .. } => assert_eq!(url, "not a url"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn policy_parses_from_text() {
        assert_eq!(
            "use-successful".parse::<PartialFailurePolicy>().unwrap(),
            PartialFailurePolicy::UseSuccessful
        );
        assert_eq!(
            " Discard ".parse::<PartialFailurePolicy>().unwrap(),
            PartialFailurePolicy::DiscardAll
        );
        assert!("sometimes".parse::<PartialFailurePolicy>().is_err());
    }
}
