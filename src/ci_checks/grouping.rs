use super::RefCheck;
use std::{cmp::Ordering, collections::HashMap};

/// Group of checks that belong to no workflow.
pub const OTHER_GROUP: &str = "Other";

const CODE_SCANNING_GROUP: &str = "Code scanning results";
const CODE_SCANNING_APP: &str = "GitHub Code Scanning";

/// Groups checks by workflow name, and by workflow event when the checks were
/// triggered by more than one kind of event.
///
/// Groups are ordered by name with [`OTHER_GROUP`] last; checks within a group
/// are ordered by name.
pub fn group_check_runs_by_workflow(checks: &[RefCheck]) -> Vec<(String, Vec<RefCheck>)> {
    let mut events: Vec<&str> = checks
        .iter()
        .filter_map(|x| x.actions_workflow.as_ref())
        .map(|x| x.event.trim())
        .filter(|x| !x.is_empty())
        .collect();
    events.sort_unstable();
    events.dedup();
    let has_multiple_event_types = events.len() > 1;

    let mut groups: HashMap<String, Vec<RefCheck>> = HashMap::new();
    for check in checks {
        let workflow = check.actions_workflow.as_ref();
        let mut group = workflow
            .map(|x| x.name.as_str())
            .filter(|x| !x.is_empty())
            .unwrap_or(OTHER_GROUP)
            .to_owned();

        if let Some(workflow) = workflow {
            if has_multiple_event_types && !workflow.event.trim().is_empty() {
                group = format!("{group} ({})", workflow.event);
            }
        }

        if group == OTHER_GROUP && check.app_name == CODE_SCANNING_APP {
            group = CODE_SCANNING_GROUP.to_owned();
        }

        groups.entry(group).or_default().push(check.clone());
    }

    let names: Vec<String> = check_run_group_names(groups.keys().map(String::as_str))
        .into_iter()
        .map(ToOwned::to_owned)
        .collect();
    names
        .into_iter()
        .filter_map(|name| {
            let mut checks = groups.remove(&name)?;
            checks.sort_by(|a, b| compare_names(&a.name, &b.name));
            Some((name, checks))
        })
        .collect()
}

/// Sorts group names alphabetically with [`OTHER_GROUP`] always last.
pub fn check_run_group_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut names: Vec<_> = names.into_iter().collect();
    names.sort_by(|a, b| match (*a == OTHER_GROUP, *b == OTHER_GROUP) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_names(a, b),
    });
    names
}

/// Case insensitive first, ordinal to break ties.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci_checks::tests::completed;
    use crate::github_models::GhWorkflowRun;
    use crate::types::CheckConclusion;

    fn check_run(name: &str, app_name: &str, workflow: Option<&str>, event: Option<&str>) -> RefCheck {
        let mut check = completed(1, CheckConclusion::Success);
        check.name = name.to_owned();
        check.app_name = app_name.to_owned();
        if workflow.is_some() || event.is_some() {
            check.actions_workflow = Some(GhWorkflowRun {
                id: 1,
                workflow_id: 1,
                name: workflow.unwrap_or_default().to_owned(),
                event: event.unwrap_or_default().to_owned(),
                check_suite_id: 1,
                created_at: "2022-08-01T00:00:00Z".parse().unwrap(),
                logs_url: String::new(),
                html_url: None,
            });
        }
        check
    }

    fn group_names(checks: &[RefCheck]) -> Vec<String> {
        group_check_runs_by_workflow(checks).into_iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn test_groups_by_workflow_name() {
        let checks = [check_run("1", "", Some("test1"), None), check_run("1", "", Some("test2"), None)];
        assert_eq!(vec!["test1", "test2"], group_names(&checks));
    }

    #[test]
    fn test_groups_checks_without_workflow_into_other() {
        let checks = [check_run("1", "", Some("test1"), None), check_run("1", "", None, None)];
        assert_eq!(vec!["test1", "Other"], group_names(&checks));
    }

    #[test]
    fn test_groups_code_scanning_results() {
        let checks = [
            check_run("1", "", Some("test1"), None),
            check_run("1", "", None, None),
            check_run("1", "GitHub Code Scanning", None, None),
        ];
        assert_eq!(vec!["Code scanning results", "test1", "Other"], group_names(&checks));
    }

    #[test]
    fn test_groups_by_event_when_there_are_several_events() {
        let mut checks = vec![
            check_run("1", "", Some("test1"), None),
            check_run("1", "", Some("test2"), None),
        ];

        // no events
        assert_eq!(vec!["test1", "test2"], group_names(&checks));

        // only one event
        checks.push(check_run("1", "", Some("test3"), Some("pull_request")));
        assert_eq!(vec!["test1", "test2", "test3"], group_names(&checks));

        // two events
        checks.push(check_run("1", "", Some("test4"), Some("push")));
        assert_eq!(
            vec!["test1", "test2", "test3 (pull_request)", "test4 (push)"],
            group_names(&checks)
        );
    }

    #[test]
    fn test_other_group_is_always_last() {
        let names = check_run_group_names(["zebra", "Other", "alpha", "Beta"]);
        assert_eq!(vec!["alpha", "Beta", "zebra", "Other"], names);
    }

    #[test]
    fn test_checks_sorted_within_group() {
        let checks = [
            check_run("lint", "", Some("ci"), None),
            check_run("Build", "", Some("ci"), None),
            check_run("audit", "", Some("ci"), None),
        ];
        let groups = group_check_runs_by_workflow(&checks);
        let names: Vec<_> = groups[0].1.iter().map(|x| x.name.as_str()).collect();
        assert_eq!(vec!["audit", "Build", "lint"], names);
    }
}
