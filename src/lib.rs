//! CI check aggregation and failed pull request check notifications for
//! GitHub repositories.

pub mod accounts;
pub mod ci_checks;
pub mod commits;
pub mod config;
pub mod display;
pub mod github_client;
pub mod github_models;
pub mod notifications;
pub mod repository_id;
pub mod status_store;
pub mod task;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use repository_id::RepositoryId;
