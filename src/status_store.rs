//! Caches the rolled up checks of refs and keeps them fresh for subscribers.

use crate::{
    accounts::{account_for_endpoint, AccountStore},
    ci_checks::{create_combined_check_from_checks, CheckRunAggregator, CombinedRefCheck},
    github_client::ClientConnector,
    task::{self, next_tick, PollHandle},
    types::Repository,
};
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

const SUBSCRIPTION_BUFFER: usize = 8;

#[derive(Clone, Debug)]
struct CacheEntry {
    repository: Repository,
    gitref: String,
    check: Option<CombinedRefCheck>,
    fetched_at: DateTime<Utc>,
}

pub struct CheckStatusStore {
    accounts: Arc<dyn AccountStore>,
    connector: Arc<dyn ClientConnector>,
    refresh_interval: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

/// Cache key of a ref, shaped like the REST path of its combined status.
pub fn cache_key(repository: &Repository, gitref: &str) -> String {
    let Repository { endpoint, id, .. } = repository;
    format!(
        "{}/repos/{}/{}/commits/{gitref}/status",
        endpoint.trim_end_matches('/'),
        id.owner,
        id.name
    )
}

impl CheckStatusStore {
    pub fn new(accounts: Arc<dyn AccountStore>, connector: Arc<dyn ClientConnector>) -> Self {
        Self {
            accounts,
            connector,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    /// Cached checks of a ref, without fetching.
    pub async fn try_get_status(
        &self,
        repository: &Repository,
        gitref: &str,
    ) -> Option<CombinedRefCheck> {
        let cache = self.cache.lock().await;
        cache.get(&cache_key(repository, gitref)).and_then(|x| x.check.clone())
    }

    pub async fn fetch_status(
        &self,
        repository: &Repository,
        gitref: &str,
    ) -> Option<CombinedRefCheck> {
        self.fetch_status_at(repository, gitref, Utc::now()).await
    }

    /// Fetches and caches the checks of a ref. When they can not be loaded the
    /// cached value is kept and returned.
    #[tracing::instrument(skip(self, repository), fields(repository = %repository))]
    pub async fn fetch_status_at(
        &self,
        repository: &Repository,
        gitref: &str,
        now: DateTime<Utc>,
    ) -> Option<CombinedRefCheck> {
        let key = cache_key(repository, gitref);
        let checks = match self.load_checks(repository, gitref).await {
            Some(x) => x,
            None => {
                let cache = self.cache.lock().await;
                return cache.get(&key).and_then(|x| x.check.clone());
            }
        };
        let check = create_combined_check_from_checks(checks);
        let entry = CacheEntry {
            repository: repository.clone(),
            gitref: gitref.to_owned(),
            check: check.clone(),
            fetched_at: now,
        };
        self.cache.lock().await.insert(key, entry);
        check
    }

    async fn load_checks(
        &self,
        repository: &Repository,
        gitref: &str,
    ) -> Option<Vec<crate::ci_checks::RefCheck>> {
        let account = match account_for_endpoint(&*self.accounts, &repository.endpoint).await {
            Some(x) => x,
            None => {
                debug!(endpoint = %repository.endpoint, "no account for endpoint");
                return None;
            }
        };
        let client = match self.connector.connect(&account) {
            Ok(x) => x,
            Err(err) => {
                warn!(%err, "failed to get client");
                return None;
            }
        };
        CheckRunAggregator::new(client)
            .fetch_ref_checks(&repository.id, gitref)
            .await
    }

    /// Refetches every cached ref last fetched at least the refresh interval
    /// before `now`. Returns how many were refetched.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> usize {
        let eligible: Vec<(Repository, String)> = {
            let cache = self.cache.lock().await;
            cache
                .values()
                .filter(|x| match (now - x.fetched_at).to_std() {
                    Ok(age) => age >= self.refresh_interval,
                    Err(_) => false,
                })
                .map(|x| (x.repository.clone(), x.gitref.clone()))
                .collect()
        };
        debug!(count = eligible.len(), "refreshing statuses");
        for (repository, gitref) in &eligible {
            self.fetch_status_at(repository, gitref, now).await;
        }
        eligible.len()
    }

    /// Fetches the checks of a ref every `period` and streams them until the
    /// handle is cancelled. Results arriving after cancellation are dropped.
    pub fn subscribe(
        self: &Arc<Self>,
        repository: Repository,
        gitref: String,
        period: Duration,
    ) -> (PollHandle, ReceiverStream<Option<CombinedRefCheck>>) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let store = self.clone();
        let handle = PollHandle::spawn(move |token| async move {
            let mut interval = task::interval(period);
            while next_tick(&mut interval, &token).await {
                let check = store.fetch_status(&repository, &gitref).await;
                if token.is_cancelled() {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    sent = tx.send(check) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(%repository, %gitref, "subscription ended");
        });
        (handle, ReceiverStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accounts::ConfiguredAccounts,
        github_client::StaticConnector,
        repository_id::RepositoryId,
        test_utils::{check_run, FakeGitHubClient},
        types::{Account, CheckConclusion, CheckStatus, DOTCOM_ENDPOINT},
    };
    use chrono::Duration as ChronoDuration;
    use futures::StreamExt;

    fn t0() -> DateTime<Utc> {
        "2022-08-01T10:00:00Z".parse().unwrap()
    }

    fn repository() -> Repository {
        Repository::dotcom(RepositoryId::new("desktop", "desktop"))
    }

    fn store() -> (Arc<FakeGitHubClient>, Arc<CheckStatusStore>) {
        let client = Arc::new(FakeGitHubClient::default());
        let mut connector = StaticConnector::default();
        connector.insert(DOTCOM_ENDPOINT, client.clone());
        let accounts = ConfiguredAccounts::new(vec![Account {
            endpoint: DOTCOM_ENDPOINT.to_owned(),
            login: "mona".to_owned(),
            emails: vec![],
        }]);
        let store = CheckStatusStore::new(Arc::new(accounts), Arc::new(connector));
        (client, Arc::new(store))
    }

    fn success(id: u64) -> crate::github_models::GhCheckRun {
        check_run(id, &format!("check-{id}"), id, CheckStatus::Completed, Some(CheckConclusion::Success))
    }

    #[test]
    fn test_cache_key() {
        let repo = Repository::new(
            "https://ghe.example.com/api/v3/",
            RepositoryId::new("desktop", "desktop"),
        );
        assert_eq!(
            "https://ghe.example.com/api/v3/repos/desktop/desktop/commits/main/status",
            cache_key(&repo, "main")
        );
    }

    #[tokio::test]
    async fn test_fetch_then_get() {
        let (client, store) = store();
        client.set_checks("main", vec![success(1), success(2)]);

        assert_eq!(None, store.try_get_status(&repository(), "main").await);

        let fetched = store.fetch_status_at(&repository(), "main", t0()).await.unwrap();
        assert_eq!(Some(CheckConclusion::Success), fetched.conclusion);
        assert_eq!(Some(fetched), store.try_get_status(&repository(), "main").await);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_cached_status() {
        let (client, store) = store();
        client.set_checks("main", vec![success(1)]);
        store.fetch_status_at(&repository(), "main", t0()).await;

        client.fail_ref("main");
        let fetched = store.fetch_status_at(&repository(), "main", t0()).await;

        assert!(fetched.is_some());
        assert_eq!(fetched, store.try_get_status(&repository(), "main").await);
    }

    #[tokio::test]
    async fn test_no_checks_clears_cached_status() {
        let (client, store) = store();
        client.set_checks("main", vec![success(1)]);
        store.fetch_status_at(&repository(), "main", t0()).await;

        client.set_checks("main", vec![]);
        store.fetch_status_at(&repository(), "main", t0()).await;

        assert_eq!(None, store.try_get_status(&repository(), "main").await);
    }

    #[tokio::test]
    async fn test_refresh_only_stale_entries() {
        let (client, store) = store();
        client.set_checks("main", vec![success(1)]);
        client.set_checks("next", vec![success(2)]);
        store.fetch_status_at(&repository(), "main", t0()).await;
        store
            .fetch_status_at(&repository(), "next", t0() + ChronoDuration::seconds(30))
            .await;

        assert_eq!(0, store.refresh_at(t0() + ChronoDuration::seconds(59)).await);
        assert_eq!(1, store.refresh_at(t0() + ChronoDuration::seconds(60)).await);
        assert_eq!(1, store.refresh_at(t0() + ChronoDuration::seconds(90)).await);
        assert_eq!(4, client.call_count("fetch_ref_check_runs"));
    }

    #[tokio::test]
    async fn test_without_account_nothing_is_fetched() {
        let client = Arc::new(FakeGitHubClient::default());
        let mut connector = StaticConnector::default();
        connector.insert(DOTCOM_ENDPOINT, client.clone());
        let store = CheckStatusStore::new(
            Arc::new(ConfiguredAccounts::default()),
            Arc::new(connector),
        );

        assert_eq!(None, store.fetch_status_at(&repository(), "main", t0()).await);
        assert_eq!(0, client.call_count("fetch_ref_check_runs"));
    }

    #[tokio::test]
    async fn test_subscribe_streams_until_cancelled() {
        let (client, store) = store();
        client.set_checks("main", vec![success(1)]);

        let (handle, mut stream) =
            store.subscribe(repository(), "main".to_owned(), Duration::from_millis(10));

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(Some(CheckConclusion::Success), first.conclusion);

        handle.join().await;
        while stream.next().await.is_some() {}
        let calls = client.call_count("fetch_ref_check_runs");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls, client.call_count("fetch_ref_check_runs"));
    }
}
