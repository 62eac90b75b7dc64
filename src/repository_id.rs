use core::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct RepositoryId {
    pub owner: String,
    pub name: String,
}

impl RepositoryId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        let owner = owner.into();
        let name = name.into();
        Self { owner, name }
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Error)]
#[error("Expecting in `:owner/:name` format, but was `{0}`.")]
pub struct ParseRepositoryIdError(String);

impl FromStr for RepositoryId {
    type Err = ParseRepositoryIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, name) = s
            .split_once('/')
            .ok_or_else(|| ParseRepositoryIdError(s.to_owned()))?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(ParseRepositoryIdError(s.to_owned()));
        }
        Ok(Self::new(owner, name))
    }
}

/// Git reference GitHub maintains for the head of a pull request.
pub fn pull_request_ref(number: u64) -> String {
    format!("refs/pull/{number}/head")
}

/// Number of the pull request a `refs/pull/<number>/head` ref points to.
pub fn pull_request_number(gitref: &str) -> Option<u64> {
    gitref
        .strip_prefix("refs/pull/")?
        .strip_suffix("/head")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_id_display() {
        assert_eq!(RepositoryId::new("desktop", "desktop").to_string(), "desktop/desktop");
    }

    #[test]
    fn test_parse_repository_id() {
        // trivial case
        assert_eq!(RepositoryId::new("desktop", "desktop"), "desktop/desktop".parse().unwrap());
        // missing owner
        assert_eq!(
            "Expecting in `:owner/:name` format, but was `desktop`.",
            "desktop".parse::<RepositoryId>().unwrap_err().to_string()
        );
        // empty owner
        assert_eq!(
            "Expecting in `:owner/:name` format, but was `/desktop`.",
            "/desktop".parse::<RepositoryId>().unwrap_err().to_string()
        );
        // missing name
        assert!("desktop/".parse::<RepositoryId>().is_err());
        // double separator
        assert!("desktop/desk/top".parse::<RepositoryId>().is_err());
    }

    #[test]
    fn test_pull_request_ref() {
        assert_eq!("refs/pull/42/head", pull_request_ref(42));
        assert_eq!(Some(42), pull_request_number(&pull_request_ref(42)));
        assert_eq!(None, pull_request_number("refs/heads/main"));
        assert_eq!(None, pull_request_number("refs/pull/x/head"));
    }
}
