use crate::types::Account;
use async_trait::async_trait;

/// Signed-in accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_all(&self) -> Vec<Account>;
}

/// Accounts read from the configuration file.
#[derive(Clone, Debug, Default)]
pub struct ConfiguredAccounts {
    accounts: Vec<Account>,
}

impl ConfiguredAccounts {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl AccountStore for ConfiguredAccounts {
    async fn get_all(&self) -> Vec<Account> {
        self.accounts.clone()
    }
}

/// The account signed in to `endpoint`, if any.
pub async fn account_for_endpoint(store: &dyn AccountStore, endpoint: &str) -> Option<Account> {
    let endpoint = normalize_endpoint(endpoint);
    store
        .get_all()
        .await
        .into_iter()
        .find(|x| normalize_endpoint(&x.endpoint) == endpoint)
}

/// Endpoint without its trailing slash.
pub fn normalize_endpoint(endpoint: &str) -> &str {
    endpoint.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DOTCOM_ENDPOINT;

    fn account(endpoint: &str, login: &str) -> Account {
        Account {
            endpoint: endpoint.to_owned(),
            login: login.to_owned(),
            emails: vec![],
        }
    }

    #[tokio::test]
    async fn test_account_for_endpoint() {
        let store = ConfiguredAccounts::new(vec![
            account("https://ghe.example.com/api/v3", "enterprise"),
            account("https://api.github.com/", "dotcom"),
        ]);

        let found = account_for_endpoint(&store, DOTCOM_ENDPOINT).await;
        assert_eq!(Some("dotcom"), found.as_ref().map(|x| x.login.as_str()));

        let found = account_for_endpoint(&store, "https://ghe.example.com/api/v3/").await;
        assert_eq!(Some("enterprise"), found.as_ref().map(|x| x.login.as_str()));

        assert_eq!(None, account_for_endpoint(&store, "https://other.example.com").await);
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!("https://api.github.com", normalize_endpoint("https://api.github.com/"));
        assert_eq!("https://api.github.com", normalize_endpoint("https://api.github.com"));
    }
}
