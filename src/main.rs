#![deny(rust_2018_idioms)]

use crate::{app::App, cli::Command};
use anyhow::{Context, Result};
use prcheck::{config::Config, types::Repository};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = cli::cmd();
    debug!(?cli, "launched");

    // create app
    let config = Config::load().context("Failed to load configuration.")?;
    let app = App::new(config)?;
    let endpoint = cli.endpoint.as_str();

    // process command
    use Command::*;
    match cli.cmd {
        Checks { repo, gitref, group, steps } | C { repo, gitref, group, steps } => {
            let repository = Repository::for_endpoint(endpoint, repo);
            app.print_checks(repository, &gitref, group, steps).await?
        }
        Watch { repo, gitref } => {
            let repository = Repository::for_endpoint(endpoint, repo);
            app.watch_checks(repository, gitref).await?
        }
        Notify { repos, repo_path } => {
            let repositories = repos
                .into_iter()
                .map(|repo| Repository::for_endpoint(endpoint, repo))
                .collect();
            app.notify(repositories, repo_path).await?
        }
    };

    debug!("exiting");
    Ok(())
}
