use std::fmt;

use platform_cache::CacheError;
use thiserror::Error;

use crate::contacts::ContactsError;

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to get URL from string {url:?}: {source}")]
    InvalidSource {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to fetch data from remote server ({})", FailureList(.failures))]
    Fetch { failures: Vec<FetchError> },
    #[error("failed to decode payload {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("payload cache is disabled for this session")]
    CacheDisabled,
    #[error(transparent)]
    Contacts(#[from] ContactsError),
    #[error("background task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One source that could not be fetched.
#[derive(Clone, Debug, Error)]
#[error("{url}: {reason}")]
pub struct FetchError {
    pub url: String,
    pub reason: String,
}

struct FailureList<'a>(&'a [FetchError]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}
