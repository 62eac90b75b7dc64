//! Notifies about pull requests whose checks newly failed.
//!
//! The poller remembers, per open pull request, the last rolled up state of
//! its checks and the check suites already seen completed. A notification is
//! only sent when a pull request that was seen before completes with failures
//! on check suites that were not seen completed yet.

use crate::{
    accounts::{account_for_endpoint, AccountStore},
    ci_checks::{
        create_combined_check_from_checks, CheckRunAggregator, RefCheck,
        FAILING_CHECK_CONCLUSIONS,
    },
    commits::{ApiCommitLookup, CommitLookup},
    github_client::{ClientConnector, GitHubClient},
    github_models::GhPullRequest,
    repository_id::pull_request_ref,
    task::{self, next_tick, PollHandle},
    types::{Account, CheckConclusion, CheckStatus, Commit, Repository},
};
use chrono::{DateTime, Utc};
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10 * 60);

const SHORT_SHA_LEN: usize = 9;

/// What the poller remembers about a pull request between passes.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct LastCheckedPullRequestEntry {
    pub head_sha: String,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
    pub completed_check_suite_ids: HashSet<u64>,
}

/// Checks of a pull request failed.
#[derive(PartialEq, Clone, Debug)]
pub struct ChecksFailed {
    pub repository: Repository,
    pub pull_request: GhPullRequest,
    pub checks: Vec<RefCheck>,
    pub head_sha: String,
    pub commit_summary: String,
}

impl ChecksFailed {
    pub fn title(&self) -> &'static str {
        "Pull Request checks failed"
    }

    pub fn body(&self) -> String {
        let failed = failed_check_count(&self.checks);
        let checks = if failed == 1 { "check was" } else { "checks were" };
        let short_sha = self.head_sha.get(..SHORT_SHA_LEN).unwrap_or(&self.head_sha);
        format!(
            "{} #{} ({short_sha})\n{failed} {checks} not successful.",
            self.pull_request.title, self.pull_request.number
        )
    }
}

impl fmt::Display for ChecksFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.title(), self.body())
    }
}

fn failed_check_count(checks: &[RefCheck]) -> usize {
    checks
        .iter()
        .filter(|x| matches!(x.conclusion, Some(c) if FAILING_CHECK_CONCLUSIONS.contains(&c)))
        .count()
}

/// Polls the open pull requests of one repository for failed checks.
pub struct NotificationPoller {
    repository: Repository,
    accounts: Arc<dyn AccountStore>,
    connector: Arc<dyn ClientConnector>,
    /// Falls back to the GitHub API when unset.
    commit_lookup: Option<Arc<dyn CommitLookup>>,
    notifications: UnboundedSender<ChecksFailed>,
    poll_interval: Duration,
    last_pass_at: Option<DateTime<Utc>>,
    last_checked: HashMap<u64, LastCheckedPullRequestEntry>,
    cached_commits: HashMap<String, Commit>,
    skip_commit_shas: HashSet<String>,
}

impl NotificationPoller {
    pub fn new(
        repository: Repository,
        accounts: Arc<dyn AccountStore>,
        connector: Arc<dyn ClientConnector>,
        notifications: UnboundedSender<ChecksFailed>,
    ) -> Self {
        Self {
            repository,
            accounts,
            connector,
            commit_lookup: None,
            notifications,
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_pass_at: None,
            last_checked: HashMap::new(),
            cached_commits: HashMap::new(),
            skip_commit_shas: HashSet::new(),
        }
    }

    pub fn with_commit_lookup(mut self, commit_lookup: Arc<dyn CommitLookup>) -> Self {
        self.commit_lookup = Some(commit_lookup);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn last_checked(&self, pull_request_number: u64) -> Option<&LastCheckedPullRequestEntry> {
        self.last_checked.get(&pull_request_number)
    }

    /// Switches to another repository, forgetting everything about the
    /// current one.
    pub fn set_repository(&mut self, repository: Repository) {
        if repository == self.repository {
            return;
        }
        self.repository = repository;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.cached_commits.clear();
        self.skip_commit_shas.clear();
        self.last_checked.clear();
        self.last_pass_at = None;
    }

    pub async fn poll(&mut self) -> bool {
        self.poll_at(Utc::now()).await
    }

    /// Runs a pass unless the previous one completed less than the poll
    /// interval before `now`. Returns whether the pass completed.
    #[tracing::instrument(skip(self), fields(repository = %self.repository))]
    pub async fn poll_at(&mut self, now: DateTime<Utc>) -> bool {
        if let Some(last_pass_at) = self.last_pass_at {
            let too_early = match (now - last_pass_at).to_std() {
                Ok(elapsed) => elapsed < self.poll_interval,
                Err(_) => true,
            };
            if too_early {
                debug!(%last_pass_at, "skipping pass");
                return false;
            }
        }

        let account = match account_for_endpoint(&*self.accounts, &self.repository.endpoint).await
        {
            Some(x) => x,
            None => {
                debug!(endpoint = %self.repository.endpoint, "no account for endpoint");
                return false;
            }
        };
        let client = match self.connector.connect(&account) {
            Ok(x) => x,
            Err(err) => {
                warn!(%err, "failed to get client");
                return false;
            }
        };
        let pull_requests = match client.list_open_pull_requests(&self.repository.id).await {
            Ok(x) => x,
            Err(err) => {
                warn!(%err, "failed to list open pull requests");
                return false;
            }
        };

        let aggregator = CheckRunAggregator::new(client.clone());
        let mut last_checked = HashMap::with_capacity(pull_requests.len());
        for pull_request in pull_requests {
            let entry = self
                .check_pull_request(&account, &client, &aggregator, pull_request.clone())
                .await;
            if let Some(entry) = entry {
                last_checked.insert(pull_request.number, entry);
            }
        }
        self.last_checked = last_checked;
        self.last_pass_at = Some(now);
        true
    }

    /// Evaluates a pull request and returns what to remember about it.
    async fn check_pull_request(
        &mut self,
        account: &Account,
        client: &Arc<dyn GitHubClient>,
        aggregator: &CheckRunAggregator,
        pull_request: GhPullRequest,
    ) -> Option<LastCheckedPullRequestEntry> {
        let number = pull_request.number;
        let previous = self.last_checked.get(&number).cloned();
        let head_sha = pull_request.head.sha.clone();

        if self.skip_commit_shas.contains(&head_sha) {
            return previous;
        }
        let commit = match self.load_commit(client, &head_sha).await {
            Some(x) => x,
            None => {
                self.skip_commit_shas.insert(head_sha);
                return previous;
            }
        };
        let is_own_commit = commit
            .author_email
            .as_deref()
            .map(|x| account.owns_email(x))
            .unwrap_or_default();
        if !is_own_commit {
            debug!(number, sha = %head_sha, "not authored by the signed-in user");
            self.skip_commit_shas.insert(head_sha);
            return previous;
        }

        let checks = match aggregator
            .fetch_ref_checks(&self.repository.id, &pull_request_ref(number))
            .await
        {
            Some(x) => x,
            None => return previous,
        };
        let combined = match create_combined_check_from_checks(checks) {
            Some(x) => x,
            None => return previous,
        };

        if combined.status != CheckStatus::Completed {
            return Some(LastCheckedPullRequestEntry {
                head_sha,
                status: CheckStatus::InProgress,
                conclusion: None,
                completed_check_suite_ids: HashSet::new(),
            });
        }

        let check_suite_ids: HashSet<u64> =
            combined.checks.iter().filter_map(|x| x.check_suite_id).collect();
        if let Some(previous) = &previous {
            if previous.status == CheckStatus::Completed
                && previous.completed_check_suite_ids.is_superset(&check_suite_ids)
            {
                return Some(previous.clone());
            }
        }

        let has_failures = combined.checks.iter().any(RefCheck::is_incomplete_or_failure);
        if !has_failures {
            return Some(LastCheckedPullRequestEntry {
                head_sha,
                status: CheckStatus::Completed,
                conclusion: Some(CheckConclusion::Success),
                completed_check_suite_ids: check_suite_ids,
            });
        }

        if previous.is_some() {
            self.notify(pull_request, combined.checks, head_sha.clone(), commit.summary);
        }
        Some(LastCheckedPullRequestEntry {
            head_sha,
            status: CheckStatus::Completed,
            conclusion: Some(CheckConclusion::Failure),
            completed_check_suite_ids: check_suite_ids,
        })
    }

    async fn load_commit(&mut self, client: &Arc<dyn GitHubClient>, sha: &str) -> Option<Commit> {
        if let Some(commit) = self.cached_commits.get(sha) {
            return Some(commit.clone());
        }
        let lookup: Arc<dyn CommitLookup> = match &self.commit_lookup {
            Some(x) => x.clone(),
            None => Arc::new(ApiCommitLookup::new(client.clone())),
        };
        match lookup.get_commit(&self.repository, sha).await {
            Ok(Some(commit)) => {
                self.cached_commits.insert(sha.to_owned(), commit.clone());
                Some(commit)
            }
            Ok(None) => {
                debug!(sha, "commit not found");
                None
            }
            Err(err) => {
                warn!(%err, sha, "failed to load commit");
                None
            }
        }
    }

    fn notify(
        &self,
        pull_request: GhPullRequest,
        checks: Vec<RefCheck>,
        head_sha: String,
        commit_summary: String,
    ) {
        info!(number = pull_request.number, sha = %head_sha, "checks failed");
        let event = ChecksFailed {
            repository: self.repository.clone(),
            pull_request,
            checks,
            head_sha,
            commit_summary,
        };
        if self.notifications.send(event).is_err() {
            warn!("notification receiver is gone");
        }
    }

    /// Polls every `period` on a background task until cancelled. A pass in
    /// flight is finished before the task stops.
    pub fn spawn(mut self, period: Duration) -> PollHandle {
        PollHandle::spawn(move |token| async move {
            let mut interval = task::interval(period);
            while next_tick(&mut interval, &token).await {
                self.poll().await;
                if token.is_cancelled() {
                    break;
                }
            }
            debug!(repository = %self.repository, "poller stopped");
        })
    }
}
