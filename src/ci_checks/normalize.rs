use super::RefCheck;
use crate::{
    display::format_precise_duration,
    github_models::{GhCheckRun, GhRefStatusItem, GhStatusState},
    types::{CheckConclusion, CheckStatus},
};
use chrono::DateTime;
use std::collections::HashMap;

/// Converts a legacy commit status into a check.
pub fn api_status_to_ref_check(status: &GhRefStatusItem) -> RefCheck {
    let (state, conclusion) = match status.state {
        GhStatusState::Success => (CheckStatus::Completed, Some(CheckConclusion::Success)),
        GhStatusState::Pending => (CheckStatus::InProgress, None),
        GhStatusState::Failure | GhStatusState::Error => {
            (CheckStatus::Completed, Some(CheckConclusion::Failure))
        }
    };
    RefCheck {
        id: status.id,
        name: status.context.clone(),
        description: check_run_short_description(state, conclusion, None),
        status: state,
        conclusion,
        app_name: String::new(),
        html_url: status.target_url.clone(),
        // statuses know nothing about suites
        check_suite_id: None,
        action_job_steps: None,
        actions_workflow: None,
    }
}

/// Converts a check run into a check.
pub fn api_check_run_to_ref_check(run: &GhCheckRun) -> RefCheck {
    let conclusion = run.conclusion.filter(|_| run.status == CheckStatus::Completed);
    let duration = check_duration_ms(run.started_at.as_deref(), run.completed_at.as_deref());
    RefCheck {
        id: run.id,
        name: run.name.clone(),
        description: check_run_short_description(run.status, conclusion, duration),
        status: run.status,
        conclusion,
        app_name: run.app.as_ref().map(|x| x.name.clone()).unwrap_or_default(),
        html_url: run.html_url.clone(),
        check_suite_id: run.check_suite.as_ref().map(|x| x.id),
        action_job_steps: None,
        actions_workflow: None,
    }
}

/// User facing word for a conclusion.
pub fn conclusion_adjective(conclusion: Option<CheckConclusion>) -> &'static str {
    use CheckConclusion::*;
    match conclusion {
        None => "In progress",
        Some(Success) => "Successful",
        Some(Failure) => "Failed",
        Some(Canceled) => "Canceled",
        Some(TimedOut) => "Timed out",
        Some(ActionRequired) => "Action required",
        Some(Neutral) => "Neutral",
        Some(Skipped) => "Skipped",
        Some(Stale) => "Marked as stale",
    }
}

/// Short description such as "Successful in 1m 5s", "In progress" or
/// "Failed after 3s".
///
/// Without a positive duration only the adjective is returned. Action
/// required, skipped and stale checks never carry a duration.
pub fn check_run_short_description(
    status: CheckStatus,
    conclusion: Option<CheckConclusion>,
    duration_ms: Option<i64>,
) -> String {
    let conclusion = match conclusion {
        Some(x) if status == CheckStatus::Completed => x,
        _ => return conclusion_adjective(None).to_owned(),
    };
    let adjective = conclusion_adjective(Some(conclusion));
    use CheckConclusion::*;
    if matches!(conclusion, ActionRequired | Skipped | Stale) {
        return adjective.to_owned();
    }
    let preposition = if conclusion == Success { "in" } else { "after" };
    match duration_ms {
        Some(ms) if ms > 0 => {
            format!("{adjective} {preposition} {}", format_precise_duration(ms))
        }
        _ => adjective.to_owned(),
    }
}

/// Milliseconds between two RFC 3339 timestamps. `None` when either is missing
/// or can not be parsed.
pub fn check_duration_ms(started_at: Option<&str>, completed_at: Option<&str>) -> Option<i64> {
    let started = DateTime::parse_from_rfc3339(started_at?).ok()?;
    let completed = DateTime::parse_from_rfc3339(completed_at?).ok()?;
    Some(completed.signed_duration_since(started).num_milliseconds())
}

/// Duration of a check run or job step, empty when it has not finished.
pub fn formatted_check_run_duration(started_at: Option<&str>, completed_at: Option<&str>) -> String {
    check_duration_ms(started_at, completed_at)
        .map(format_precise_duration)
        .unwrap_or_default()
}

/// Keeps only the latest run of each check.
///
/// GitHub may report several runs of the same check for a ref and only the
/// latest one counts. Runs started by a push and runs started by a pull
/// request are different checks even when they share a name. The check suite
/// id stands in for recency since suite ids only grow.
pub fn latest_check_runs_by_name(runs: Vec<GhCheckRun>) -> Vec<GhCheckRun> {
    let mut latest: Vec<GhCheckRun> = Vec::with_capacity(runs.len());
    let mut index: HashMap<(String, bool), usize> = HashMap::new();
    for run in runs {
        let key = (run.name.clone(), !run.pull_requests.is_empty());
        match index.get(&key) {
            Some(&i) => {
                if suite_id(&latest[i]) < suite_id(&run) {
                    latest[i] = run;
                }
            }
            None => {
                index.insert(key, latest.len());
                latest.push(run);
            }
        }
    }
    latest
}

fn suite_id(run: &GhCheckRun) -> Option<u64> {
    run.check_suite.as_ref().map(|x| x.id)
}
