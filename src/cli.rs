use clap::{Parser, Subcommand};
use prcheck::{types::DOTCOM_ENDPOINT, RepositoryId};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Cli {
    /// REST API root of the GitHub instance.
    #[clap(long, default_value = DOTCOM_ENDPOINT)]
    pub endpoint: String,

    #[clap(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the checks of a git ref.
    Checks {
        /// Repository identifier.
        repo: RepositoryId,

        /// Branch, sha, or ref such as `refs/pull/1/head`.
        gitref: String,

        /// Group checks by workflow.
        #[clap(long)]
        group: bool,

        /// Print the steps of failed GitHub Actions jobs.
        #[clap(long)]
        steps: bool,
    },
    /// Alias for checks.
    C {
        repo: RepositoryId,
        gitref: String,
        #[clap(long)]
        group: bool,
        #[clap(long)]
        steps: bool,
    },
    /// Follow the checks of a git ref until they complete.
    Watch {
        /// Repository identifier.
        repo: RepositoryId,

        /// Branch, sha, or ref such as `refs/pull/1/head`.
        gitref: String,
    },
    /// Notify when checks of your open pull requests fail.
    Notify {
        /// Repository identifiers.
        #[clap(required = true)]
        repos: Vec<RepositoryId>,

        /// Local clone to read commits from, instead of the API. Only with a
        /// single repository.
        #[clap(long)]
        repo_path: Option<PathBuf>,
    },
}

pub fn cmd() -> Cli {
    Cli::parse()
}
