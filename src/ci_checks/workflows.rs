use super::RefCheck;
use crate::github_models::GhWorkflowRun;
use std::collections::HashMap;

/// Keeps the most recently created run of every workflow.
///
/// Listing the runs of a branch returns past runs too; only the latest one per
/// workflow is of interest.
pub fn latest_workflow_runs(runs: Vec<GhWorkflowRun>) -> Vec<GhWorkflowRun> {
    let mut latest: Vec<GhWorkflowRun> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();
    for run in runs {
        match index.get(&run.workflow_id) {
            Some(&i) => {
                if latest[i].created_at < run.created_at {
                    latest[i] = run;
                }
            }
            None => {
                index.insert(run.workflow_id, latest.len());
                latest.push(run);
            }
        }
    }
    latest
}

/// Attaches to each check the workflow run sharing its check suite.
pub fn map_workflow_runs_to_check_runs(
    checks: Vec<RefCheck>,
    runs: &[GhWorkflowRun],
) -> Vec<RefCheck> {
    if runs.is_empty() {
        return checks;
    }
    checks
        .into_iter()
        .map(|check| {
            let run = runs
                .iter()
                .find(|run| Some(run.check_suite_id) == check.check_suite_id);
            match run {
                Some(run) => RefCheck {
                    actions_workflow: Some(run.clone()),
                    ..check
                },
                None => check,
            }
        })
        .collect()
}
