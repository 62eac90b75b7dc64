use crate::{
    accounts::normalize_endpoint,
    github_models::*,
    repository_id::RepositoryId,
    types::{Account, DOTCOM_ENDPOINT},
};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Future, Stream, TryStreamExt};
use http::header::HeaderName;
use octocrab::{Octocrab, Page};
use sekret::Secret;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), concat!("/", env!("CARGO_PKG_VERSION")));

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    GitHub(#[from] octocrab::Error),

    #[error("No client configured for endpoint `{0}`.")]
    UnknownEndpoint(String),
}

pub type ClientResult<T> = Result<T, Error>;

/// The GitHub REST endpoints the check aggregation and notification poller
/// read from. Resources that do not exist come back as `None`.
#[async_trait]
pub trait GitHubClient: Send + Sync {
    /// https://docs.github.com/en/rest/commits/statuses#get-the-combined-status-for-a-specific-reference
    async fn fetch_combined_ref_status(
        &self,
        repo_id: &RepositoryId,
        gitref: &str,
    ) -> ClientResult<Option<GhRefStatus>>;

    /// https://docs.github.com/en/rest/checks/runs#list-check-runs-for-a-git-reference
    async fn fetch_ref_check_runs(
        &self,
        repo_id: &RepositoryId,
        gitref: &str,
    ) -> ClientResult<Option<GhCheckRuns>>;

    /// https://docs.github.com/en/rest/commits/commits#get-a-commit
    async fn fetch_commit(&self, repo_id: &RepositoryId, sha: &str)
        -> ClientResult<Option<GhCommit>>;

    /// https://docs.github.com/en/rest/actions/workflow-jobs#list-jobs-for-a-workflow-run
    async fn fetch_workflow_run_jobs(
        &self,
        repo_id: &RepositoryId,
        workflow_run_id: u64,
    ) -> ClientResult<Option<GhWorkflowJobs>>;

    /// Pull request workflow run belonging to a check suite.
    async fn fetch_pr_action_workflow_run_by_check_suite_id(
        &self,
        repo_id: &RepositoryId,
        check_suite_id: u64,
    ) -> ClientResult<Option<GhWorkflowRun>>;

    /// Every pull request workflow run, past and present, of a branch.
    async fn fetch_pr_workflow_runs_by_branch_name(
        &self,
        repo_id: &RepositoryId,
        branch: &str,
    ) -> ClientResult<Option<GhWorkflowRuns>>;

    /// https://docs.github.com/en/rest/pulls/pulls#list-pull-requests
    async fn list_open_pull_requests(&self, repo_id: &RepositoryId)
        -> ClientResult<Vec<GhPullRequest>>;
}

#[derive(Clone, Debug)]
pub struct GitHubClientImpl {
    client: Octocrab,
}

impl GitHubClientImpl {
    pub fn new(endpoint: &str, token: Secret<String>) -> ClientResult<Self> {
        let mut builder = Octocrab::builder()
            .add_header(HeaderName::from_static("user-agent"), USER_AGENT.to_owned())
            .personal_token(token.0);
        let endpoint = normalize_endpoint(endpoint);
        if endpoint != DOTCOM_ENDPOINT {
            builder = builder.base_url(format!("{endpoint}/"))?;
        }
        let client = builder.build()?;
        debug!(%endpoint, "created client");
        Ok(Self { client })
    }
}

#[async_trait]
impl GitHubClient for GitHubClientImpl {
    #[tracing::instrument(skip(self))]
    async fn fetch_combined_ref_status(
        &self,
        repo_id: &RepositoryId,
        gitref: &str,
    ) -> ClientResult<Option<GhRefStatus>> {
        let RepositoryId { owner, name } = repo_id;
        let path = format!("repos/{owner}/{name}/commits/{gitref}/status");
        let params = [("per_page", "100")];
        not_found_as_none(self.client.get(path, Some(&params)).await)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_ref_check_runs(
        &self,
        repo_id: &RepositoryId,
        gitref: &str,
    ) -> ClientResult<Option<GhCheckRuns>> {
        let RepositoryId { owner, name } = repo_id;
        let path = format!("repos/{owner}/{name}/commits/{gitref}/check-runs");
        let params = [("per_page", "100")];
        not_found_as_none(self.client.get(path, Some(&params)).await)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_commit(
        &self,
        repo_id: &RepositoryId,
        sha: &str,
    ) -> ClientResult<Option<GhCommit>> {
        let RepositoryId { owner, name } = repo_id;
        let path = format!("repos/{owner}/{name}/commits/{sha}");
        not_found_as_none(self.client.get::<_, _, ()>(path, None).await)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_workflow_run_jobs(
        &self,
        repo_id: &RepositoryId,
        workflow_run_id: u64,
    ) -> ClientResult<Option<GhWorkflowJobs>> {
        let RepositoryId { owner, name } = repo_id;
        let path = format!("repos/{owner}/{name}/actions/runs/{workflow_run_id}/jobs");
        not_found_as_none(self.client.get::<_, _, ()>(path, None).await)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_pr_action_workflow_run_by_check_suite_id(
        &self,
        repo_id: &RepositoryId,
        check_suite_id: u64,
    ) -> ClientResult<Option<GhWorkflowRun>> {
        let RepositoryId { owner, name } = repo_id;
        let path = format!("repos/{owner}/{name}/actions/runs");
        let check_suite_id = check_suite_id.to_string();
        let params = [("event", "pull_request"), ("check_suite_id", check_suite_id.as_str())];
        let runs: Option<GhWorkflowRuns> =
            not_found_as_none(self.client.get(path, Some(&params)).await)?;
        Ok(runs.and_then(|x| x.workflow_runs.into_iter().next()))
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_pr_workflow_runs_by_branch_name(
        &self,
        repo_id: &RepositoryId,
        branch: &str,
    ) -> ClientResult<Option<GhWorkflowRuns>> {
        let RepositoryId { owner, name } = repo_id;
        let path = format!("repos/{owner}/{name}/actions/runs");
        let params = [("event", "pull_request"), ("branch", branch)];
        not_found_as_none(self.client.get(path, Some(&params)).await)
    }

    #[tracing::instrument(skip(self))]
    async fn list_open_pull_requests(
        &self,
        repo_id: &RepositoryId,
    ) -> ClientResult<Vec<GhPullRequest>> {
        let RepositoryId { owner, name } = repo_id;
        let items = unpage(move |page_num| async move {
            let path = match page_num {
                Some(page_num) => {
                    format!("repos/{owner}/{name}/pulls?state=open&per_page=100&page={page_num}")
                }
                None => format!("repos/{owner}/{name}/pulls?state=open&per_page=100"),
            };
            let page: Page<GhPullRequest> = self.client.get::<_, _, ()>(path, None).await?;
            Ok(page)
        });
        let pull_requests: Vec<_> = items.try_collect().await?;
        debug!(count = pull_requests.len(), "listed open pull requests");
        Ok(pull_requests)
    }
}

fn not_found_as_none<T>(result: octocrab::Result<T>) -> ClientResult<Option<T>> {
    match result {
        Ok(x) => Ok(Some(x)),
        Err(octocrab::Error::GitHub { source, .. }) if source.message == "Not Found" => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Flattens GitHub's paginated responses into a stream of items.
fn unpage<'a, T, F, Fut>(factory: F) -> impl Stream<Item = ClientResult<T>> + 'a
where
    T: Send + 'static,
    F: Fn(Option<u32>) -> Fut + Send + 'a,
    Fut: Future<Output = ClientResult<Page<T>>> + Send + 'a,
{
    try_stream! {
        let mut page_num = None;
        loop {
            let page = factory(page_num).await?;
            let has_next = page.next.is_some();
            for item in page {
                yield item;
            }
            if !has_next {
                break;
            }
            page_num = Some(page_num.unwrap_or(1) + 1);
        }
    }
}

/// Hands out the API client of an account.
pub trait ClientConnector: Send + Sync {
    fn connect(&self, account: &Account) -> ClientResult<Arc<dyn GitHubClient>>;
}

/// Clients created up front, one per endpoint.
#[derive(Default, Clone)]
pub struct StaticConnector {
    clients: HashMap<String, Arc<dyn GitHubClient>>,
}

impl StaticConnector {
    pub fn insert(&mut self, endpoint: &str, client: Arc<dyn GitHubClient>) {
        self.clients.insert(normalize_endpoint(endpoint).to_owned(), client);
    }
}

impl ClientConnector for StaticConnector {
    fn connect(&self, account: &Account) -> ClientResult<Arc<dyn GitHubClient>> {
        let endpoint = normalize_endpoint(&account.endpoint);
        self.clients
            .get(endpoint)
            .cloned()
            .ok_or_else(|| Error::UnknownEndpoint(endpoint.to_owned()))
    }
}
