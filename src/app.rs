use anyhow::{bail, ensure, Context, Error, Result};
use console::Term;
use prcheck::{
    accounts::{account_for_endpoint, ConfiguredAccounts},
    ci_checks::{
        check_run_step_url, check_status_counts, create_combined_check_from_checks,
        formatted_check_run_duration, group_check_runs_by_workflow, CheckRunAggregator,
        CombinedRefCheck, RefCheck,
    },
    commits::GitCommitLookup,
    config::Config,
    github_client::{ClientConnector, GitHubClient, StaticConnector},
    notifications::{ChecksFailed, NotificationPoller},
    repository_id::pull_request_number,
    status_store::CheckStatusStore,
    types::{CheckStatus, Repository},
};
use futures::StreamExt;
use std::{io::Write, path::PathBuf, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct App {
    config: Config,
    accounts: Arc<ConfiguredAccounts>,
    connector: Arc<StaticConnector>,
}

impl App {
    pub fn new(config: Config) -> Result<Self, Error> {
        let accounts = Arc::new(ConfiguredAccounts::new(config.accounts()));
        let connector = Arc::new(config.connector()?);
        Ok(Self {
            config,
            accounts,
            connector,
        })
    }

    async fn client_for(&self, repository: &Repository) -> Result<Arc<dyn GitHubClient>, Error> {
        let account = match account_for_endpoint(&*self.accounts, &repository.endpoint).await {
            Some(x) => x,
            None => bail!(
                "No account for `{}`. Add one to the config file or set PRCHECK_LOGIN and PRCHECK_TOKEN.",
                repository.endpoint
            ),
        };
        Ok(self.connector.connect(&account)?)
    }

    pub async fn print_checks(
        &self,
        repository: Repository,
        gitref: &str,
        group: bool,
        steps: bool,
    ) -> Result<(), Error> {
        let mut stdout = Term::buffered_stdout();

        let client = self.client_for(&repository).await?;
        let mut aggregator = CheckRunAggregator::new(client);
        let checks = aggregator
            .fetch_ref_checks(&repository.id, gitref)
            .await
            .with_context(|| format!("Failed to load checks of `{gitref}` in {repository}."))?;
        let checks = aggregator
            .attach_workflow_runs_by_check_suite(&repository.id, checks)
            .await;
        let checks = if steps {
            aggregator.attach_job_steps(&repository.id, checks).await
        } else {
            checks
        };

        let pull_request = pull_request_number(gitref);
        let combined = match create_combined_check_from_checks(checks) {
            Some(x) => x,
            None => {
                writeln!(stdout, "{repository} {gitref}: no checks")?;
                stdout.flush()?;
                return Ok(());
            }
        };
        writeln!(stdout, "{repository} {gitref}: {combined}")?;
        let counts: Vec<_> = check_status_counts(&combined.checks)
            .into_iter()
            .map(|(state, count)| format!("{count} {state}"))
            .collect();
        writeln!(stdout, "{}", counts.join(", "))?;
        writeln!(stdout, "----------")?;

        if group {
            for (name, checks) in group_check_runs_by_workflow(&combined.checks) {
                writeln!(stdout, "{name}")?;
                for check in &checks {
                    writeln!(stdout, "  {check}")?;
                    write_steps(&mut stdout, check, &repository, pull_request)?;
                }
            }
        } else {
            for check in &combined.checks {
                writeln!(stdout, "{check}")?;
                write_steps(&mut stdout, check, &repository, pull_request)?;
            }
        }

        stdout.flush()?;
        Ok(())
    }

    pub async fn watch_checks(&self, repository: Repository, gitref: String) -> Result<(), Error> {
        let mut stdout = Term::buffered_stdout();

        let store = CheckStatusStore::new(self.accounts.clone(), self.connector.clone())
            .with_refresh_interval(self.config.refresh_interval());
        let store = Arc::new(store);
        let period = self.config.refresh_interval();
        let (handle, mut updates) = store.subscribe(repository.clone(), gitref.clone(), period);

        writeln!(stdout, "{repository} {gitref}")?;
        writeln!(stdout, "----------")?;
        stdout.flush()?;

        let mut printed = 0;
        while let Some(update) = updates.next().await {
            stdout.clear_last_lines(printed)?;
            printed = write_combined(&mut stdout, update.as_ref())?;
            stdout.flush()?;
            let completed = update
                .map(|x| x.status == CheckStatus::Completed)
                .unwrap_or_default();
            if completed {
                break;
            }
        }

        handle.join().await;
        Ok(())
    }

    pub async fn notify(
        &self,
        repositories: Vec<Repository>,
        repo_path: Option<PathBuf>,
    ) -> Result<(), Error> {
        ensure!(
            repo_path.is_none() || repositories.len() == 1,
            "A local clone can only be used with a single repository."
        );
        let mut stdout = Term::buffered_stdout();

        let (tx, mut notifications) = mpsc::unbounded_channel::<ChecksFailed>();
        let period = self.config.poll_interval();
        let handles: Vec<_> = repositories
            .into_iter()
            .map(|repository| {
                info!(%repository, "watching pull requests");
                let mut poller = NotificationPoller::new(
                    repository,
                    self.accounts.clone(),
                    self.connector.clone(),
                    tx.clone(),
                )
                .with_poll_interval(period);
                if let Some(path) = &repo_path {
                    poller = poller.with_commit_lookup(Arc::new(GitCommitLookup::new(path)));
                }
                poller.spawn(period)
            })
            .collect();
        drop(tx);

        loop {
            tokio::select! {
                event = notifications.recv() => match event {
                    Some(event) => {
                        writeln!(stdout, "{event}")?;
                        if let Some(url) = &event.pull_request.html_url {
                            writeln!(stdout, "{url}")?;
                        }
                        writeln!(stdout)?;
                        stdout.flush()?;
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    debug!("interrupted");
                    break;
                }
            }
        }

        for handle in handles {
            handle.join().await;
        }
        Ok(())
    }
}

/// Writes the rolled up checks, returning how many lines were written.
fn write_combined(stdout: &mut Term, combined: Option<&CombinedRefCheck>) -> Result<usize, Error> {
    let combined = match combined {
        Some(x) => x,
        None => {
            writeln!(stdout, "no checks")?;
            return Ok(1);
        }
    };
    writeln!(stdout, "{combined}")?;
    for check in &combined.checks {
        writeln!(stdout, "{check}")?;
    }
    Ok(combined.checks.len() + 1)
}

fn write_steps(
    stdout: &mut Term,
    check: &RefCheck,
    repository: &Repository,
    pull_request_number: Option<u64>,
) -> Result<(), Error> {
    if !check.is_incomplete_or_failure() {
        return Ok(());
    }
    let steps = match &check.action_job_steps {
        Some(x) => x,
        None => return Ok(()),
    };
    for step in steps {
        let duration =
            formatted_check_run_duration(step.started_at.as_deref(), step.completed_at.as_deref());
        let state = match step.conclusion {
            Some(conclusion) => conclusion.to_string(),
            None => step.status.to_string(),
        };
        write!(stdout, "    {:>2}. {} - {state}", step.number, step.name)?;
        if !duration.is_empty() {
            write!(stdout, " ({duration})")?;
        }
        writeln!(stdout)?;
        if let Some(url) = check_run_step_url(check, step, repository, pull_request_number) {
            writeln!(stdout, "        {url}")?;
        }
    }
    Ok(())
}

