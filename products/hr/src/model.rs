use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use platform_cache::PayloadCache;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::{
    config::{DirectoryConfig, PartialFailurePolicy},
    contacts::{AccessStatus, ContactField, ContactRecord, ContactsService},
    decode::{decode_payloads, enrich},
    employee::Employee,
    error::{DirectoryError, DirectoryResult},
    fetch::RemoteFetcher,
    store::{EmployeeStore, UpdateOrigin},
};

/// Where the model currently is in a refresh or cache read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FetchingRemote,
    ReadingCache,
    Decoding,
    Caching,
    Updated,
    FetchFailed,
    ReadFailed,
}

#[derive(Clone, Debug)]
pub struct RefreshSummary {
    pub employees: usize,
    pub payloads: usize,
    pub failed_sources: usize,
    pub cached: bool,
    pub refreshed_at: DateTime<Utc>,
}

/// Ties fetcher, decoder, cache, contacts and store together.
pub struct DirectoryModel {
    config: DirectoryConfig,
    fetcher: RemoteFetcher,
    cache: Option<Arc<PayloadCache>>,
    contacts: Arc<dyn ContactsService>,
    contacts_granted: AtomicBool,
    store: Arc<EmployeeStore>,
    phase: watch::Sender<Phase>,
}

impl DirectoryModel {
    pub fn new(config: DirectoryConfig, contacts: Arc<dyn ContactsService>) -> Self {
        Self::with_client(config, contacts, reqwest::Client::new())
    }

    /// A cache that cannot be opened disables caching for the session.
    pub fn with_client(
        config: DirectoryConfig,
        contacts: Arc<dyn ContactsService>,
        client: reqwest::Client,
    ) -> Self {
        let cache = match config.cache.as_ref().map(PayloadCache::open) {
            Some(Ok(cache)) => Some(Arc::new(cache)),
            Some(Err(err)) => {
                error!(error = %err, "payload cache unavailable; continuing without it");
                None
            }
            None => None,
        };
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            config,
            fetcher: RemoteFetcher::new(client),
            cache,
            contacts,
            contacts_granted: AtomicBool::new(false),
            store: Arc::new(EmployeeStore::new()),
            phase,
        }
    }

    pub fn store(&self) -> &Arc<EmployeeStore> {
        &self.store
    }

    pub fn is_data_cached(&self) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|cache| cache.is_data_cached())
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.send_replace(phase);
    }

    /// Launch sequence: ask for contacts access, show cached data if any,
    /// then refresh from the network regardless.
    #[instrument(name = "directory.start", skip_all)]
    pub async fn start(&self) -> DirectoryResult<RefreshSummary> {
        let access = self.request_contacts_access().await?;
        info!(?access, "contacts access resolved");
        if self.is_data_cached() {
            if let Err(err) = self.reload_from_cache().await {
                warn!(error = %err, "cached roster could not be loaded");
            }
        }
        self.refresh().await
    }

    pub async fn request_contacts_access(&self) -> DirectoryResult<AccessStatus> {
        let contacts = Arc::clone(&self.contacts);
        let status = tokio::task::spawn_blocking(move || contacts.request_access()).await?;
        self.contacts_granted
            .store(status == AccessStatus::Granted, Ordering::SeqCst);
        Ok(status)
    }

    /// Fetches every source, decodes, caches and replaces the store. On any
    /// failure the store and the cache keep their previous contents.
    #[instrument(name = "directory.refresh", skip_all)]
    pub async fn refresh(&self) -> DirectoryResult<RefreshSummary> {
        self.set_phase(Phase::FetchingRemote);
        let outcome = self.fetcher.fetch_all(&self.config.sources).await;
        let failed_sources = outcome.failures.len();
        if !outcome.is_complete() {
            let usable = self.config.partial_failure == PartialFailurePolicy::UseSuccessful
                && !outcome.payloads.is_empty();
            if !usable {
                error!(failed = failed_sources, "remote refresh failed");
                self.set_phase(Phase::FetchFailed);
                return Err(DirectoryError::Fetch {
                    failures: outcome.failures,
                });
            }
            warn!(
                failed = failed_sources,
                fetched = outcome.payloads.len(),
                "continuing with the sources that answered"
            );
        }

        let payloads = outcome.payloads;
        self.set_phase(Phase::Decoding);
        let employees = self
            .decode(payloads.clone())
            .await
            .inspect_err(|err| {
                error!(error = %err, "remote payloads could not be decoded");
                self.set_phase(Phase::FetchFailed);
            })?;

        let cached = match &self.cache {
            Some(cache) => {
                self.set_phase(Phase::Caching);
                cache.write(&payloads).await.inspect_err(|err| {
                    error!(error = %err, "failed to cache roster");
                    self.set_phase(Phase::FetchFailed);
                })?;
                true
            }
            None => false,
        };

        let count = employees.len();
        self.store.replace(employees, UpdateOrigin::Remote).await;
        self.set_phase(Phase::Updated);
        info!(employees = count, payloads = payloads.len(), cached, "roster refreshed");
        Ok(RefreshSummary {
            employees: count,
            payloads: payloads.len(),
            failed_sources,
            cached,
            refreshed_at: Utc::now(),
        })
    }

    /// Replaces the store with the cached roster. Returns the employee count.
    #[instrument(name = "directory.reload_from_cache", skip_all)]
    pub async fn reload_from_cache(&self) -> DirectoryResult<usize> {
        let cache = self.cache.as_ref().ok_or(DirectoryError::CacheDisabled)?;
        self.set_phase(Phase::ReadingCache);
        let payloads = cache.read().await.inspect_err(|err| {
            error!(error = %err, "failed to read cached roster");
            self.set_phase(Phase::ReadFailed);
        })?;

        self.set_phase(Phase::Decoding);
        let employees = self.decode(payloads).await.inspect_err(|err| {
            error!(error = %err, "cached roster could not be decoded");
            self.set_phase(Phase::ReadFailed);
        })?;

        let count = employees.len();
        self.store.replace(employees, UpdateOrigin::Cache).await;
        self.set_phase(Phase::Updated);
        info!(employees = count, "roster loaded from cache");
        Ok(count)
    }

    /// The address book changed: re-link identifiers from the cached roster.
    /// Never triggers a remote fetch. `None` when nothing is cached.
    #[instrument(name = "directory.contacts_changed", skip_all)]
    pub async fn contacts_did_change(&self) -> DirectoryResult<Option<usize>> {
        let contacts = Arc::clone(&self.contacts);
        let status = tokio::task::spawn_blocking(move || contacts.access_status()).await?;
        self.contacts_granted
            .store(status == AccessStatus::Granted, Ordering::SeqCst);
        if !self.is_data_cached() {
            return Ok(None);
        }
        self.reload_from_cache().await.map(Some)
    }

    /// Full contact card linked to `employee`, when access allows it.
    pub async fn contact_record(
        &self,
        employee: &Employee,
    ) -> DirectoryResult<Option<ContactRecord>> {
        let Some(identifier) = employee.contacts_card_identifier.clone() else {
            return Ok(None);
        };
        if !self.contacts_granted.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let contacts = Arc::clone(&self.contacts);
        let record = tokio::task::spawn_blocking(move || {
            contacts.fetch(&identifier, &ContactField::ALL)
        })
        .await?
        .inspect_err(|err| error!(error = %err, "failed to find contact card"))?;
        Ok(record)
    }

    async fn decode(&self, payloads: Vec<Bytes>) -> DirectoryResult<Vec<Employee>> {
        let contacts = Arc::clone(&self.contacts);
        let link = self.contacts_granted.load(Ordering::SeqCst);
        tokio::task::spawn_blocking(move || -> DirectoryResult<Vec<Employee>> {
            let employees = decode_payloads(&payloads)?;
            Ok(if link {
                enrich(employees, contacts.as_ref())
            } else {
                employees
            })
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::{AddressBook, NoContacts};
    use platform_cache::CacheSettings;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn roster(names: &[(&str, &str)]) -> serde_json::Value {
        let employees: Vec<_> = names
            .iter()
            .map(|(first, last)| json!({"fname": first, "lname": last, "position": "WEB"}))
            .collect();
        json!({ "employees": employees })
    }

    async fn serve(server: &MockServer, route: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn config(
        server: &MockServer,
        routes: &[&str],
        cache_root: &std::path::Path,
    ) -> DirectoryConfig {
        let sources: Vec<_> = routes
            .iter()
            .map(|route| format!("{}{}", server.uri(), route))
            .collect();
        DirectoryConfig::new(DirectoryConfig::parse_sources(&sources).unwrap())
            .with_cache(Some(CacheSettings::new(cache_root)))
    }

    #[tokio::test]
    async fn refresh_updates_store_cache_and_phase() {
        let server = MockServer::start().await;
        serve(&server, "/one", roster(&[("Liis", "Tamm")])).await;
        serve(&server, "/two", roster(&[("Kati", "Karu"), ("Mart", "Kask")])).await;
        let tmp = tempfile::tempdir().unwrap();

        let model = DirectoryModel::new(
            config(&server, &["/one", "/two"], tmp.path()),
            Arc::new(NoContacts),
        );
        assert_eq!(model.phase(), Phase::Idle);
        assert!(!model.is_data_cached());

        let summary = model.refresh().await.unwrap();
        assert_eq!(summary.employees, 3);
        assert_eq!(summary.payloads, 2);
        assert!(summary.cached);
        assert!(model.is_data_cached());
        assert_eq!(model.phase(), Phase::Updated);
        assert_eq!(model.store().snapshot().await[0].full_name(), "Kati Karu");
    }

    #[tokio::test]
    async fn decode_failure_keeps_previous_roster() {
        let server = MockServer::start().await;
        serve(&server, "/good", roster(&[("Liis", "Tamm")])).await;
        Mock::given(method("GET"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        let tmp = tempfile::tempdir().unwrap();

        let good = DirectoryModel::new(
            config(&server, &["/good"], tmp.path()),
            Arc::new(NoContacts),
        );
        good.refresh().await.unwrap();

        let bad = DirectoryModel::new(
            config(&server, &["/bad"], tmp.path()),
            Arc::new(NoContacts),
        );
        bad.reload_from_cache().await.unwrap();
        let err = bad.refresh().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Decode { .. }));
        assert_eq!(bad.phase(), Phase::FetchFailed);
        assert_eq!(bad.store().len().await, 1);
        assert_eq!(bad.reload_from_cache().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cache_write_failure_keeps_previous_roster() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/office"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(roster(&[("Kati", "Karu"), ("Mart", "Kask")])),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        serve(&server, "/office", roster(&[("Liis", "Tamm")])).await;
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("cache");

        let model = DirectoryModel::new(
            config(&server, &["/office"], &root),
            Arc::new(NoContacts),
        );
        model.refresh().await.unwrap();
        let before = model.store().snapshot().await;
        let mut events = model.store().subscribe();

        std::fs::remove_dir_all(&root).unwrap();
        std::fs::write(&root, b"not a directory").unwrap();
        let err = model.refresh().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Cache(_)));
        assert_eq!(model.phase(), Phase::FetchFailed);
        assert_eq!(*model.store().snapshot().await, *before);
        assert!(model.is_data_cached());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn contact_record_requires_link_and_access() {
        let server = MockServer::start().await;
        serve(&server, "/one", roster(&[("Liis", "Tamm")])).await;
        let tmp = tempfile::tempdir().unwrap();
        let book = Arc::new(AddressBook::granted(vec![ContactRecord {
            identifier: "card-1".into(),
            given_name: "Liis".into(),
            family_name: "Tamm".into(),
            emails: vec!["liis@example.com".into()],
            ..ContactRecord::default()
        }]));

        let model = DirectoryModel::new(config(&server, &["/one"], tmp.path()), book);
        model.start().await.unwrap();
        let liis = model.store().find("tamm.liis").await.unwrap();
        assert_eq!(liis.contacts_card_identifier.as_deref(), Some("card-1"));
        let card = model.contact_record(&liis).await.unwrap().unwrap();
        assert_eq!(card.emails, ["liis@example.com".to_string()]);

        let stranger = Employee::new("No", "Card");
        assert!(model.contact_record(&stranger).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reload_without_cache_is_reported() {
        let server = MockServer::start().await;
        let model = DirectoryModel::new(
            config(&server, &[], std::path::Path::new("/unused")).with_cache(None),
            Arc::new(NoContacts),
        );
        assert!(matches!(
            model.reload_from_cache().await,
            Err(DirectoryError::CacheDisabled)
        ));
        assert_eq!(model.contacts_did_change().await.unwrap(), None);
    }
}
