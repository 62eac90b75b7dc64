//! Unified model over legacy commit statuses and check runs.
//!
//! A [`RefCheck`] abstracts the difference between the two APIs. Every legacy
//! status can be expressed as a check run but not the other way around, so
//! the model follows check runs.

mod aggregator;
mod grouping;
mod normalize;
mod workflows;

pub use aggregator::CheckRunAggregator;
pub use grouping::{check_run_group_names, group_check_runs_by_workflow, OTHER_GROUP};
pub use normalize::{
    api_check_run_to_ref_check, api_status_to_ref_check, check_duration_ms,
    check_run_short_description, conclusion_adjective, formatted_check_run_duration,
    latest_check_runs_by_name,
};
pub use workflows::{latest_workflow_runs, map_workflow_runs_to_check_runs};

use crate::{
    github_models::{GhWorkflowJobStep, GhWorkflowRun},
    types::{CheckConclusion, CheckStatus, Repository},
};
use std::collections::{BTreeMap, HashSet};

/// Conclusions reported to the user as not successful.
pub const FAILING_CHECK_CONCLUSIONS: [CheckConclusion; 4] = [
    CheckConclusion::Failure,
    CheckConclusion::Canceled,
    CheckConclusion::ActionRequired,
    CheckConclusion::TimedOut,
];

#[derive(PartialEq, Clone, Debug)]
pub struct RefCheck {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub status: CheckStatus,
    /// Only present when `status` is [`CheckStatus::Completed`].
    pub conclusion: Option<CheckConclusion>,
    pub app_name: String,
    pub html_url: Option<String>,

    // actions specific
    pub check_suite_id: Option<u64>,
    pub action_job_steps: Option<Vec<GhWorkflowJobStep>>,
    pub actions_workflow: Option<GhWorkflowRun>,
}

/// Rolled up status of every check of a ref.
#[derive(PartialEq, Clone, Debug)]
pub struct CombinedRefCheck {
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
    pub checks: Vec<RefCheck>,
}

impl RefCheck {
    /// Completed without producing a verdict: timed out, stale or canceled.
    pub fn is_incomplete(&self) -> bool {
        use CheckConclusion::*;
        self.status == CheckStatus::Completed
            && matches!(self.conclusion, Some(TimedOut | Stale | Canceled))
    }

    /// Failed or requires action.
    pub fn is_failure(&self) -> bool {
        use CheckConclusion::*;
        self.status == CheckStatus::Completed
            && matches!(self.conclusion, Some(Failure | ActionRequired))
    }

    pub fn is_incomplete_or_failure(&self) -> bool {
        self.is_incomplete() || self.is_failure()
    }

    /// Success, neutral or skipped.
    pub fn is_success(&self) -> bool {
        use CheckConclusion::*;
        self.status == CheckStatus::Completed
            && matches!(self.conclusion, Some(Success | Neutral | Skipped))
    }
}

/// Combines checks into a single status and conclusion.
///
/// Returns `None` when there are no checks at all, which is distinct from
/// failing to load them: it means whatever is known about the ref should be
/// cleared.
pub fn create_combined_check_from_checks(checks: Vec<RefCheck>) -> Option<CombinedRefCheck> {
    let (status, conclusion) = match checks.as_slice() {
        [] => return None,
        [only] => (only.status, only.conclusion),
        _ if checks.iter().any(RefCheck::is_incomplete_or_failure) => {
            (CheckStatus::Completed, Some(CheckConclusion::Failure))
        }
        _ if checks.iter().all(RefCheck::is_success) => {
            (CheckStatus::Completed, Some(CheckConclusion::Success))
        }
        _ => (CheckStatus::InProgress, None),
    };
    Some(CombinedRefCheck {
        status,
        conclusion,
        checks,
    })
}

/// Marks the checks listed in `pending` as in progress, e.g. right after the
/// user asked for them to be re-run, and recombines.
pub fn manually_set_checks_to_pending(
    cached: &[RefCheck],
    pending: &[RefCheck],
) -> Option<CombinedRefCheck> {
    let pending: HashSet<u64> = pending.iter().map(|x| x.id).collect();
    let checks = cached
        .iter()
        .map(|check| {
            if !pending.contains(&check.id) {
                return check.clone();
            }
            let action_job_steps = check.action_job_steps.as_ref().map(|steps| {
                steps
                    .iter()
                    .map(|step| GhWorkflowJobStep {
                        status: CheckStatus::InProgress,
                        conclusion: None,
                        ..step.clone()
                    })
                    .collect()
            });
            RefCheck {
                status: CheckStatus::InProgress,
                conclusion: None,
                action_job_steps,
                ..check.clone()
            }
        })
        .collect();
    create_combined_check_from_checks(checks)
}

/// Counts checks by conclusion, or by status for checks without one.
pub fn check_status_counts(checks: &[RefCheck]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for check in checks {
        let key = match check.conclusion {
            Some(conclusion) => conclusion.to_string(),
            None => check.status.to_string(),
        };
        *counts.entry(key).or_default() += 1;
    }
    counts
}

/// URL of a job step's log. Falls back to the pull request page when the check
/// has no URL of its own.
pub fn check_run_step_url(
    check: &RefCheck,
    step: &GhWorkflowJobStep,
    repository: &Repository,
    pull_request_number: Option<u64>,
) -> Option<String> {
    if let Some(url) = &check.html_url {
        return Some(format!("{url}/#step:{}:1", step.number));
    }
    match (&repository.html_url, pull_request_number) {
        (Some(url), Some(number)) => Some(format!("{url}/pull/{number}")),
        _ => None,
    }
}
