//! Settings file and environment.
//!
//! The file lives at `<config dir>/prcheck/config.toml` unless `PRCHECK_CONFIG`
//! points elsewhere. Without configured accounts a single account is read from
//! `PRCHECK_LOGIN`, `PRCHECK_TOKEN`, `PRCHECK_EMAILS` and `PRCHECK_ENDPOINT`.

use crate::{
    github_client::{self, GitHubClientImpl, StaticConnector},
    notifications::DEFAULT_POLL_INTERVAL,
    status_store::DEFAULT_REFRESH_INTERVAL,
    types::{Account, DOTCOM_ENDPOINT},
};
use directories_next::ProjectDirs;
use sekret::Secret;
use serde::{Deserialize, Deserializer};
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tracing::debug;

const CONFIG_PATH_VAR: &str = "PRCHECK_CONFIG";
const LOGIN_VAR: &str = "PRCHECK_LOGIN";
const TOKEN_VAR: &str = "PRCHECK_TOKEN";
const EMAILS_VAR: &str = "PRCHECK_EMAILS";
const ENDPOINT_VAR: &str = "PRCHECK_ENDPOINT";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config file at `{path}`.")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file at `{path}`.")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine the config directory.")]
    NoConfigDir,
}

#[derive(Deserialize)]
pub struct Config {
    #[serde(default = "default_poll_interval_mins")]
    pub poll_interval_mins: u64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// An account with its access token.
#[derive(Deserialize)]
pub struct AccountConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub login: String,
    #[serde(deserialize_with = "secret")]
    pub token: Secret<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

fn default_poll_interval_mins() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs() / 60
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}

fn default_endpoint() -> String {
    DOTCOM_ENDPOINT.to_owned()
}

fn secret<'de, D>(deserializer: D) -> Result<Secret<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Secret)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_mins: default_poll_interval_mins(),
            refresh_interval_secs: default_refresh_interval_secs(),
            accounts: vec![],
        }
    }
}

impl Config {
    /// Reads the config file, if any, then falls back to the environment for
    /// the account.
    pub fn load() -> Result<Self, Error> {
        let path = match env::var_os(CONFIG_PATH_VAR) {
            Some(x) => PathBuf::from(x),
            None => default_config_path()?,
        };
        let config = Self::read(&path)?.unwrap_or_default();
        Ok(config.with_env_fallback(|key| env::var(key).ok()))
    }

    /// `None` when there is no file at `path`.
    pub fn read(path: &Path) -> Result<Option<Self>, Error> {
        let text = match fs::read_to_string(path) {
            Ok(x) => x,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file");
                return Ok(None);
            }
            Err(source) => {
                let path = path.to_owned();
                return Err(Error::Read { path, source });
            }
        };
        let config = toml::from_str(&text).map_err(|source| Error::Parse {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(Some(config))
    }

    /// Adds the account described by the environment when none is
    /// configured.
    pub fn with_env_fallback(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if !self.accounts.is_empty() {
            return self;
        }
        if let (Some(login), Some(token)) = (var(LOGIN_VAR), var(TOKEN_VAR)) {
            let emails = var(EMAILS_VAR)
                .map(|x| {
                    x.split(',')
                        .map(str::trim)
                        .filter(|x| !x.is_empty())
                        .map(ToOwned::to_owned)
                        .collect()
                })
                .unwrap_or_default();
            let endpoint = var(ENDPOINT_VAR).unwrap_or_else(default_endpoint);
            self.accounts.push(AccountConfig {
                endpoint,
                login,
                token: Secret(token),
                emails,
            });
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_mins * 60)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.accounts
            .iter()
            .map(|x| Account {
                endpoint: x.endpoint.clone(),
                login: x.login.clone(),
                emails: x.emails.clone(),
            })
            .collect()
    }

    /// Creates an API client for every account.
    pub fn connector(&self) -> Result<StaticConnector, github_client::Error> {
        let mut connector = StaticConnector::default();
        for account in &self.accounts {
            let client = GitHubClientImpl::new(&account.endpoint, Secret(account.token.0.clone()))?;
            connector.insert(&account.endpoint, Arc::new(client));
        }
        Ok(connector)
    }
}

fn default_config_path() -> Result<PathBuf, Error> {
    let dirs = ProjectDirs::from("", "", "prcheck").ok_or(Error::NoConfigDir)?;
    Ok(dirs.config_dir().join("config.toml"))
}
