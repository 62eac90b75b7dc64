//! Defines application domain data types.

use crate::repository_id::RepositoryId;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Endpoint of GitHub.com's REST API.
pub const DOTCOM_ENDPOINT: &str = "https://api.github.com";

// types ------------------------------

/// Lifecycle of a check run. Legacy statuses are mapped onto it too.
///
/// GitHub also reports `waiting`, `requested` and `pending` for runs that have
/// not started; those read as [`CheckStatus::Queued`].
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Hash, Copy, Clone)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    #[serde(alias = "waiting", alias = "requested", alias = "pending")]
    Queued,
    InProgress,
    Completed,
}

/// Final outcome of a completed check run.
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Hash, Copy, Clone)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    ActionRequired,
    #[serde(rename = "cancelled")]
    Canceled,
    TimedOut,
    Skipped,
    Stale,
}

/// A GitHub repository as seen from one API endpoint.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Repository {
    /// REST API root, e.g. `https://api.github.com`.
    pub endpoint: String,
    pub id: RepositoryId,
    pub html_url: Option<String>,
}

/// A signed-in user.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Account {
    pub endpoint: String,
    pub login: String,
    pub emails: Vec<String>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Commit {
    pub sha: String,
    /// First line of the commit message.
    pub summary: String,
    pub author_email: Option<String>,
}

// end: types ------------------------------

// CheckStatus impls ------------------------------

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CheckStatus::*;
        let s = match self {
            Queued => "queued",
            InProgress => "in_progress",
            Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for CheckStatus {
    type Err = ParseCheckStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use CheckStatus::*;
        let s = match s {
            "queued" | "waiting" | "requested" | "pending" => Queued,
            "in_progress" => InProgress,
            "completed" => Completed,
            _ => {
                let err = ParseCheckStateError(format!("unexpected check status, was `{}`", s));
                return Err(err);
            }
        };
        Ok(s)
    }
}

// end: CheckStatus impls ------------------------------

// CheckConclusion impls ------------------------------

impl fmt::Display for CheckConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CheckConclusion::*;
        let s = match self {
            Success => "success",
            Failure => "failure",
            Neutral => "neutral",
            ActionRequired => "action_required",
            Canceled => "cancelled",
            TimedOut => "timed_out",
            Skipped => "skipped",
            Stale => "stale",
        };
        f.write_str(s)
    }
}

impl FromStr for CheckConclusion {
    type Err = ParseCheckStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use CheckConclusion::*;
        let s = match s {
            "success" => Success,
            "failure" => Failure,
            "neutral" => Neutral,
            "action_required" => ActionRequired,
            "cancelled" => Canceled,
            "timed_out" => TimedOut,
            "skipped" => Skipped,
            "stale" => Stale,
            _ => {
                let err =
                    ParseCheckStateError(format!("unexpected check conclusion, was `{}`", s));
                return Err(err);
            }
        };
        Ok(s)
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ParseCheckStateError(String /* message */);

// end: CheckConclusion impls ------------------------------

// Repository impls ------------------------------

impl Repository {
    pub fn new(endpoint: impl Into<String>, id: RepositoryId) -> Self {
        Self {
            endpoint: endpoint.into(),
            id,
            html_url: None,
        }
    }

    /// A repository on `endpoint`, with its web URL when it is GitHub.com.
    pub fn for_endpoint(endpoint: &str, id: RepositoryId) -> Self {
        if endpoint.trim_end_matches('/') == DOTCOM_ENDPOINT {
            Self::dotcom(id)
        } else {
            Self::new(endpoint, id)
        }
    }

    /// A repository on GitHub.com.
    pub fn dotcom(id: RepositoryId) -> Self {
        let html_url = format!("https://github.com/{}", id);
        Self {
            endpoint: DOTCOM_ENDPOINT.to_owned(),
            id,
            html_url: Some(html_url),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

// end: Repository impls ------------------------------

// Account impls ------------------------------

impl Account {
    /// Whether the email belongs to this account. Case insensitive.
    pub fn owns_email(&self, email: &str) -> bool {
        self.emails.iter().any(|x| x.eq_ignore_ascii_case(email))
    }
}

// end: Account impls ------------------------------
