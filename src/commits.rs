use crate::{
    github_client::{self, GitHubClient},
    types::{Commit, Repository},
};
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::task;
use tracing::debug;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    GitHub(#[from] github_client::Error),

    #[error("Commit lookup task failed.")]
    Join(#[from] task::JoinError),
}

/// Finds commits by sha. Unknown commits are `None`.
#[async_trait]
pub trait CommitLookup: Send + Sync {
    async fn get_commit(&self, repository: &Repository, sha: &str) -> Result<Option<Commit>, Error>;
}

/// Reads commits from a local clone.
#[derive(Clone, Debug)]
pub struct GitCommitLookup {
    path: PathBuf,
}

impl GitCommitLookup {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CommitLookup for GitCommitLookup {
    async fn get_commit(&self, _repository: &Repository, sha: &str) -> Result<Option<Commit>, Error> {
        let path = self.path.clone();
        let sha = sha.to_owned();
        task::spawn_blocking(move || find_local_commit(&path, &sha)).await?
    }
}

fn find_local_commit(path: &Path, sha: &str) -> Result<Option<Commit>, Error> {
    let repo = git2::Repository::open(path)?;
    let oid = match git2::Oid::from_str(sha) {
        Ok(x) => x,
        Err(_) => return Ok(None),
    };
    let commit = match repo.find_commit(oid) {
        Ok(x) => x,
        Err(err) if err.code() == git2::ErrorCode::NotFound => {
            debug!(sha, "commit not found locally");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    let author = commit.author();
    Ok(Some(Commit {
        sha: commit.id().to_string(),
        summary: commit.summary().unwrap_or_default().to_owned(),
        author_email: author.email().map(ToOwned::to_owned),
    }))
}

/// Reads commits through the GitHub API, for repositories without a local
/// clone.
#[derive(Clone)]
pub struct ApiCommitLookup {
    client: Arc<dyn GitHubClient>,
}

impl ApiCommitLookup {
    pub fn new(client: Arc<dyn GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CommitLookup for ApiCommitLookup {
    async fn get_commit(&self, repository: &Repository, sha: &str) -> Result<Option<Commit>, Error> {
        let commit = match self.client.fetch_commit(&repository.id, sha).await? {
            Some(x) => x,
            None => return Ok(None),
        };
        let summary = commit.commit.message.lines().next().unwrap_or_default().to_owned();
        let author_email = commit.commit.author.and_then(|x| x.email);
        Ok(Some(Commit {
            sha: commit.sha,
            summary,
            author_email,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        repository_id::RepositoryId,
        test_utils::{commit, FakeGitHubClient},
    };

    fn repository() -> Repository {
        Repository::dotcom(RepositoryId::new("desktop", "desktop"))
    }

    fn init_repo_with_commit(path: &Path) -> git2::Oid {
        let repo = git2::Repository::init(path).unwrap();
        let sig = git2::Signature::now("Mona Lisa", "mona@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "Fix flaky test\n\nIt was flaky.", &tree, &[])
            .unwrap()
    }

    #[tokio::test]
    async fn test_git_commit_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let oid = init_repo_with_commit(dir.path());
        let lookup = GitCommitLookup::new(dir.path());

        let found = lookup
            .get_commit(&repository(), &oid.to_string())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(oid.to_string(), found.sha);
        assert_eq!("Fix flaky test", found.summary);
        assert_eq!(Some("mona@example.com"), found.author_email.as_deref());
    }

    #[tokio::test]
    async fn test_git_commit_lookup_unknown_sha() {
        let dir = tempfile::tempdir().unwrap();
        init_repo_with_commit(dir.path());
        let lookup = GitCommitLookup::new(dir.path());

        let unknown = "0123456789abcdef0123456789abcdef01234567";
        assert_eq!(None, lookup.get_commit(&repository(), unknown).await.unwrap());
        assert_eq!(None, lookup.get_commit(&repository(), "not-a-sha").await.unwrap());
    }

    #[tokio::test]
    async fn test_git_commit_lookup_without_repository() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = GitCommitLookup::new(dir.path().join("missing"));
        assert!(lookup.get_commit(&repository(), "abc").await.is_err());
    }

    #[tokio::test]
    async fn test_api_commit_lookup() {
        let client = FakeGitHubClient::default();
        client.set_commit(commit("abc", "Add feature\n\nDetails", "mona@example.com"));
        let lookup = ApiCommitLookup::new(Arc::new(client));

        let found = lookup.get_commit(&repository(), "abc").await.unwrap().unwrap();
        assert_eq!("Add feature", found.summary);
        assert_eq!(Some("mona@example.com"), found.author_email.as_deref());

        assert_eq!(None, lookup.get_commit(&repository(), "def").await.unwrap());
    }
}
