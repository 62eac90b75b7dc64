//! Payloads of the GitHub REST API endpoints this crate reads.
//!
//! Only the fields we use are declared. Timestamps of check runs and job steps
//! are kept as strings; they are parsed when a duration is needed.

use crate::types::{CheckConclusion, CheckStatus};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// [Combined status for a ref](https://docs.github.com/en/rest/commits/statuses#get-the-combined-status-for-a-specific-reference).
#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhRefStatus {
    pub sha: String,
    pub statuses: Vec<GhRefStatusItem>,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhRefStatusItem {
    pub id: u64,
    pub state: GhStatusState,
    pub context: String,
    pub target_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, PartialEq, Eq, Copy, Clone, Debug)]
#[serde(rename_all = "snake_case")]
pub enum GhStatusState {
    Success,
    Pending,
    Failure,
    Error,
}

/// [Check runs for a ref](https://docs.github.com/en/rest/checks/runs#list-check-runs-for-a-git-reference).
#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhCheckRuns {
    pub total_count: u64,
    pub check_runs: Vec<GhCheckRun>,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhCheckRun {
    pub id: u64,
    pub name: String,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
    pub app: Option<GhApp>,
    pub check_suite: Option<GhCheckSuiteRef>,
    pub html_url: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    #[serde(default)]
    pub pull_requests: Vec<GhPullRequestRef>,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhApp {
    pub name: String,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhCheckSuiteRef {
    pub id: u64,
}

/// Minimal pull request reference embedded in check runs.
#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhPullRequestRef {
    pub number: u64,
}

/// [Workflow runs](https://docs.github.com/en/rest/actions/workflow-runs).
#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhWorkflowRuns {
    pub total_count: u64,
    pub workflow_runs: Vec<GhWorkflowRun>,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhWorkflowRun {
    pub id: u64,
    pub workflow_id: u64,
    pub name: String,
    pub event: String,
    pub check_suite_id: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub logs_url: String,
    pub html_url: Option<String>,
}

/// [Jobs of a workflow run](https://docs.github.com/en/rest/actions/workflow-jobs).
#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhWorkflowJobs {
    pub total_count: u64,
    pub jobs: Vec<GhWorkflowJob>,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhWorkflowJob {
    pub id: u64,
    pub name: String,
    pub html_url: Option<String>,
    #[serde(default)]
    pub steps: Vec<GhWorkflowJobStep>,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhWorkflowJobStep {
    pub name: String,
    pub number: u64,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhCommit {
    pub sha: String,
    pub commit: GhCommitDetail,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhCommitDetail {
    pub author: Option<GhCommitActor>,
    pub message: String,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhCommitActor {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhPullRequest {
    pub number: u64,
    pub title: String,
    pub head: GhPullRequestHead,
    pub html_url: Option<String>,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct GhPullRequestHead {
    pub sha: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
}
