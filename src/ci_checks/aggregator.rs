use super::{
    api_check_run_to_ref_check, api_status_to_ref_check, create_combined_check_from_checks,
    latest_check_runs_by_name, latest_workflow_runs, map_workflow_runs_to_check_runs,
    CombinedRefCheck, RefCheck,
};
use crate::{
    github_client::{ClientResult, GitHubClient},
    github_models::{GhWorkflowJobs, GhWorkflowRun},
    repository_id::RepositoryId,
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};

/// Loads the checks of a ref and enriches them with GitHub Actions data.
///
/// Workflow runs and jobs are memoized for as long as the aggregator lives,
/// which is meant to be a single pass.
pub struct CheckRunAggregator {
    client: Arc<dyn GitHubClient>,
    /// Workflow run id to its jobs. `None` records that the lookup came back
    /// empty.
    jobs_cache: HashMap<u64, Option<GhWorkflowJobs>>,
    /// Check suite id to its workflow run.
    actions_cache: HashMap<u64, Option<GhWorkflowRun>>,
}

impl CheckRunAggregator {
    pub fn new(client: Arc<dyn GitHubClient>) -> Self {
        Self {
            client,
            jobs_cache: HashMap::new(),
            actions_cache: HashMap::new(),
        }
    }

    pub fn clear_caches(&mut self) {
        self.jobs_cache.clear();
        self.actions_cache.clear();
    }

    /// Legacy statuses and latest check runs of a ref.
    ///
    /// `None` when either list could not be loaded.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_ref_checks(
        &self,
        repo_id: &RepositoryId,
        gitref: &str,
    ) -> Option<Vec<RefCheck>> {
        let (statuses, check_runs) = futures::join!(
            self.client.fetch_combined_ref_status(repo_id, gitref),
            self.client.fetch_ref_check_runs(repo_id, gitref),
        );
        let statuses = ok_or_warn(statuses, "combined status")?;
        let check_runs = ok_or_warn(check_runs, "check runs")?;

        let mut checks: Vec<RefCheck> =
            statuses.statuses.iter().map(api_status_to_ref_check).collect();
        checks.extend(
            latest_check_runs_by_name(check_runs.check_runs)
                .iter()
                .map(api_check_run_to_ref_check),
        );
        debug!(count = checks.len(), "fetched checks");
        Some(checks)
    }

    /// Checks of a ref rolled up into one. `None` when they could not be loaded
    /// or when there are none.
    pub async fn fetch_combined_ref_check(
        &self,
        repo_id: &RepositoryId,
        gitref: &str,
    ) -> Option<CombinedRefCheck> {
        let checks = self.fetch_ref_checks(repo_id, gitref).await?;
        create_combined_check_from_checks(checks)
    }

    /// Attaches to each check the pull request workflow run of its check suite.
    #[tracing::instrument(skip(self, checks))]
    pub async fn attach_workflow_runs_by_check_suite(
        &mut self,
        repo_id: &RepositoryId,
        checks: Vec<RefCheck>,
    ) -> Vec<RefCheck> {
        let mut attached = Vec::with_capacity(checks.len());
        for check in checks {
            let suite_id = match check.check_suite_id {
                Some(x) => x,
                None => {
                    attached.push(check);
                    continue;
                }
            };
            let run = match self.actions_cache.get(&suite_id) {
                Some(run) => run.clone(),
                None => {
                    let run = self
                        .client
                        .fetch_pr_action_workflow_run_by_check_suite_id(repo_id, suite_id)
                        .await;
                    let run = ok_or_warn(run, "workflow run");
                    self.actions_cache.insert(suite_id, run.clone());
                    run
                }
            };
            attached.push(RefCheck {
                actions_workflow: run.or(check.actions_workflow.clone()),
                ..check
            });
        }
        attached
    }

    /// Attaches to each check the latest pull request workflow run of `branch`
    /// sharing its check suite.
    #[tracing::instrument(skip(self, checks))]
    pub async fn attach_workflow_runs_by_branch(
        &self,
        repo_id: &RepositoryId,
        branch: &str,
        checks: Vec<RefCheck>,
    ) -> Vec<RefCheck> {
        let runs = self
            .client
            .fetch_pr_workflow_runs_by_branch_name(repo_id, branch)
            .await;
        match ok_or_warn(runs, "branch workflow runs") {
            Some(runs) => {
                map_workflow_runs_to_check_runs(checks, &latest_workflow_runs(runs.workflow_runs))
            }
            None => checks,
        }
    }

    /// Attaches job steps to checks that belong to a workflow run. A check
    /// run of GitHub Actions shares its id with the job it ran.
    #[tracing::instrument(skip(self, checks))]
    pub async fn attach_job_steps(
        &mut self,
        repo_id: &RepositoryId,
        checks: Vec<RefCheck>,
    ) -> Vec<RefCheck> {
        let mut attached = Vec::with_capacity(checks.len());
        for check in checks {
            let run_id = match &check.actions_workflow {
                Some(run) => run.id,
                None => {
                    attached.push(check);
                    continue;
                }
            };
            if !self.jobs_cache.contains_key(&run_id) {
                let jobs = self.client.fetch_workflow_run_jobs(repo_id, run_id).await;
                self.jobs_cache.insert(run_id, ok_or_warn(jobs, "workflow jobs"));
            }
            let job = self
                .jobs_cache
                .get(&run_id)
                .and_then(Option::as_ref)
                .and_then(|jobs| jobs.jobs.iter().find(|job| job.id == check.id));
            match job {
                Some(job) => attached.push(RefCheck {
                    action_job_steps: Some(job.steps.clone()),
                    html_url: job.html_url.clone().or(check.html_url.clone()),
                    ..check
                }),
                None => attached.push(check),
            }
        }
        attached
    }
}

fn ok_or_warn<T>(result: ClientResult<Option<T>>, resource: &str) -> Option<T> {
    match result {
        Ok(x) => x,
        Err(err) => {
            warn!(%err, resource, "request failed");
            None
        }
    }
}
