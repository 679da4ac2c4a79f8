use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

/// Everything a fan-out fetch produced. Payloads keep source order.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub payloads: Vec<Bytes>,
    pub failures: Vec<FetchError>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Issues one GET per source concurrently and waits for all of them.
#[derive(Clone, Debug, Default)]
pub struct RemoteFetcher {
    client: reqwest::Client,
}

impl RemoteFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn fetch_all(&self, sources: &[Url]) -> FetchOutcome {
        let mut tasks = JoinSet::new();
        for (index, url) in sources.iter().cloned().enumerate() {
            let client = self.client.clone();
            tasks.spawn(async move {
                let result = fetch_one(&client, &url).await;
                (index, url, result)
            });
        }

        let mut payloads = Vec::with_capacity(sources.len());
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, url, Ok(body))) => {
                    debug!(%url, bytes = body.len(), "source fetched");
                    payloads.push((index, body));
                }
                Ok((index, url, Err(err))) => {
                    warn!(%url, error = %err, "source fetch failed");
                    failures.push((
                        index,
                        FetchError {
                            url: url.to_string(),
                            reason: err.to_string(),
                        },
                    ));
                }
                Err(err) => {
                    warn!(error = %err, "fetch task aborted");
                    failures.push((
                        usize::MAX,
                        FetchError {
                            url: String::new(),
                            reason: err.to_string(),
                        },
                    ));
                }
            }
        }

        payloads.sort_by_key(|(index, _)| *index);
        failures.sort_by_key(|(index, _)| *index);
        FetchOutcome {
            payloads: payloads.into_iter().map(|(_, body)| body).collect(),
            failures: failures.into_iter().map(|(_, failure)| failure).collect(),
        }
    }
}

async fn fetch_one(client: &reqwest::Client, url: &Url) -> reqwest::Result<Bytes> {
    client
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await
}
