use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use platform_cache::CacheSettings;
use products_hr::{DEFAULT_SOURCES, DirectoryConfig, PartialFailurePolicy};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub directory: DirectoryConfig,
    pub contacts_file: Option<PathBuf>,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let sources = match env("DIRECTORY_SOURCES") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
        };
        if sources.is_empty() {
            return Err(anyhow!("DIRECTORY_SOURCES must name at least one endpoint"));
        }
        let sources =
            DirectoryConfig::parse_sources(&sources).context("invalid DIRECTORY_SOURCES")?;

        let partial_failure = env("DIRECTORY_PARTIAL_FAILURE")
            .map(|raw| raw.parse::<PartialFailurePolicy>())
            .transpose()
            .map_err(|err| anyhow!("invalid DIRECTORY_PARTIAL_FAILURE: {err}"))?
            .unwrap_or_default();

        let cache_disabled = env("DIRECTORY_CACHE_DISABLED")
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let cache = if cache_disabled {
            None
        } else {
            Some(CacheSettings::from_lookup(&env))
        };

        let contacts_file = env("DIRECTORY_CONTACTS_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let cors_allowed_origins = split_list(
            &env("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| "http://localhost:5173".into()),
        );

        Ok(Self {
            directory: DirectoryConfig::new(sources)
                .with_partial_failure(partial_failure)
                .with_cache(cache),
            contacts_file,
            cors_allowed_origins,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}
