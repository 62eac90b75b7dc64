//! In-memory GitHub and builders for API payloads.

use crate::{
    github_client::{ClientResult, Error, GitHubClient},
    github_models::*,
    repository_id::RepositoryId,
    types::{CheckConclusion, CheckStatus},
};
use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

#[derive(Default)]
struct State {
    statuses: HashMap<String, GhRefStatus>,
    check_runs: HashMap<String, GhCheckRuns>,
    commits: HashMap<String, GhCommit>,
    jobs: HashMap<u64, GhWorkflowJobs>,
    runs_by_suite: HashMap<u64, GhWorkflowRun>,
    runs_by_branch: HashMap<String, GhWorkflowRuns>,
    pull_requests: Vec<GhPullRequest>,
    failing_refs: HashSet<String>,
    calls: Vec<&'static str>,
}

/// Answers from what was put in; anything else is not found.
#[derive(Default)]
pub struct FakeGitHubClient {
    state: Mutex<State>,
}

impl FakeGitHubClient {
    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn set_statuses(&self, gitref: &str, statuses: Vec<GhRefStatusItem>) {
        let status = GhRefStatus {
            sha: gitref.to_owned(),
            statuses,
        };
        self.with(|s| s.statuses.insert(gitref.to_owned(), status));
    }

    pub fn set_check_runs(&self, gitref: &str, check_runs: Vec<GhCheckRun>) {
        let runs = GhCheckRuns {
            total_count: check_runs.len() as _,
            check_runs,
        };
        self.with(|s| s.check_runs.insert(gitref.to_owned(), runs));
    }

    /// Sets both lists of a ref, with no legacy statuses.
    pub fn set_checks(&self, gitref: &str, check_runs: Vec<GhCheckRun>) {
        self.set_statuses(gitref, vec![]);
        self.set_check_runs(gitref, check_runs);
    }

    pub fn set_commit(&self, commit: GhCommit) {
        self.with(|s| s.commits.insert(commit.sha.clone(), commit));
    }

    pub fn set_jobs(&self, workflow_run_id: u64, jobs: Vec<GhWorkflowJob>) {
        let jobs = GhWorkflowJobs {
            total_count: jobs.len() as _,
            jobs,
        };
        self.with(|s| s.jobs.insert(workflow_run_id, jobs));
    }

    pub fn set_run_for_suite(&self, check_suite_id: u64, run: GhWorkflowRun) {
        self.with(|s| s.runs_by_suite.insert(check_suite_id, run));
    }

    pub fn set_runs_for_branch(&self, branch: &str, runs: Vec<GhWorkflowRun>) {
        let runs = GhWorkflowRuns {
            total_count: runs.len() as _,
            workflow_runs: runs,
        };
        self.with(|s| s.runs_by_branch.insert(branch.to_owned(), runs));
    }

    pub fn set_pull_requests(&self, pull_requests: Vec<GhPullRequest>) {
        self.with(|s| s.pull_requests = pull_requests);
    }

    /// Makes every request about `gitref` fail.
    pub fn fail_ref(&self, gitref: &str) {
        self.with(|s| s.failing_refs.insert(gitref.to_owned()));
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|x| **x == method).count())
    }

    fn record(&self, method: &'static str, gitref: Option<&str>) -> ClientResult<()> {
        self.with(|s| {
            s.calls.push(method);
            match gitref {
                Some(gitref) if s.failing_refs.contains(gitref) => {
                    Err(Error::UnknownEndpoint("https://fake.invalid".to_owned()))
                }
                _ => Ok(()),
            }
        })
    }
}

#[async_trait]
impl GitHubClient for FakeGitHubClient {
    async fn fetch_combined_ref_status(
        &self,
        _repo_id: &RepositoryId,
        gitref: &str,
    ) -> ClientResult<Option<GhRefStatus>> {
        self.record("fetch_combined_ref_status", Some(gitref))?;
        Ok(self.with(|s| s.statuses.get(gitref).cloned()))
    }

    async fn fetch_ref_check_runs(
        &self,
        _repo_id: &RepositoryId,
        gitref: &str,
    ) -> ClientResult<Option<GhCheckRuns>> {
        self.record("fetch_ref_check_runs", Some(gitref))?;
        Ok(self.with(|s| s.check_runs.get(gitref).cloned()))
    }

    async fn fetch_commit(
        &self,
        _repo_id: &RepositoryId,
        sha: &str,
    ) -> ClientResult<Option<GhCommit>> {
        self.record("fetch_commit", Some(sha))?;
        Ok(self.with(|s| s.commits.get(sha).cloned()))
    }

    async fn fetch_workflow_run_jobs(
        &self,
        _repo_id: &RepositoryId,
        workflow_run_id: u64,
    ) -> ClientResult<Option<GhWorkflowJobs>> {
        self.record("fetch_workflow_run_jobs", None)?;
        Ok(self.with(|s| s.jobs.get(&workflow_run_id).cloned()))
    }

    async fn fetch_pr_action_workflow_run_by_check_suite_id(
        &self,
        _repo_id: &RepositoryId,
        check_suite_id: u64,
    ) -> ClientResult<Option<GhWorkflowRun>> {
        self.record("fetch_pr_action_workflow_run_by_check_suite_id", None)?;
        Ok(self.with(|s| s.runs_by_suite.get(&check_suite_id).cloned()))
    }

    async fn fetch_pr_workflow_runs_by_branch_name(
        &self,
        _repo_id: &RepositoryId,
        branch: &str,
    ) -> ClientResult<Option<GhWorkflowRuns>> {
        self.record("fetch_pr_workflow_runs_by_branch_name", Some(branch))?;
        Ok(self.with(|s| s.runs_by_branch.get(branch).cloned()))
    }

    async fn list_open_pull_requests(
        &self,
        _repo_id: &RepositoryId,
    ) -> ClientResult<Vec<GhPullRequest>> {
        self.record("list_open_pull_requests", None)?;
        Ok(self.with(|s| s.pull_requests.clone()))
    }
}

// builders ------------------------------

pub fn check_run(
    id: u64,
    name: &str,
    check_suite_id: u64,
    status: CheckStatus,
    conclusion: Option<CheckConclusion>,
) -> GhCheckRun {
    GhCheckRun {
        id,
        name: name.to_owned(),
        status,
        conclusion,
        app: Some(GhApp {
            name: "GitHub Actions".to_owned(),
        }),
        check_suite: Some(GhCheckSuiteRef { id: check_suite_id }),
        html_url: None,
        started_at: Some("2022-08-01T10:00:00Z".to_owned()),
        completed_at: match status {
            CheckStatus::Completed => Some("2022-08-01T10:01:05Z".to_owned()),
            _ => None,
        },
        pull_requests: vec![GhPullRequestRef { number: 1 }],
    }
}

pub fn workflow_run(id: u64, workflow_id: u64, check_suite_id: u64, created_at: &str) -> GhWorkflowRun {
    GhWorkflowRun {
        id,
        workflow_id,
        name: format!("workflow-{workflow_id}"),
        event: "pull_request".to_owned(),
        check_suite_id,
        created_at: created_at.parse().unwrap(),
        logs_url: String::new(),
        html_url: None,
    }
}

pub fn commit(sha: &str, message: &str, email: &str) -> GhCommit {
    GhCommit {
        sha: sha.to_owned(),
        commit: GhCommitDetail {
            author: Some(GhCommitActor {
                name: Some("Mona Lisa".to_owned()),
                email: Some(email.to_owned()),
            }),
            message: message.to_owned(),
        },
    }
}

pub fn pull_request(number: u64, title: &str, head_sha: &str) -> GhPullRequest {
    GhPullRequest {
        number,
        title: title.to_owned(),
        head: GhPullRequestHead {
            sha: head_sha.to_owned(),
            ref_name: format!("feature-{number}"),
        },
        html_url: None,
    }
}

// end: builders ------------------------------
