//! Account table: holds resolved credentials for every configured account,
//! swapped atomically when the Secret Manager's rotation detector observes
//! a credential change.

use crate::error::{Error, Result};
use crate::types::Account;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, swap-on-write table of accounts. Readers take a cheap read lock
/// for the lifetime of a single dispatch; rotation replaces one account's
/// record under a write lock without blocking reads of other accounts.
pub struct AccountTable {
    inner: RwLock<HashMap<String, Arc<Account>>>,
}

impl AccountTable {
    pub fn new(accounts: Vec<Account>) -> Self {
        let inner = accounts
            .into_iter()
            .map(|a| (a.name.clone(), Arc::new(a)))
            .collect();
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub async fn get(&self, name: &str) -> Result<Arc<Account>> {
        self.inner
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownAccount(name.to_string()))
    }

    pub async fn names(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }

    /// Replace one account's record in place, e.g. after the rotation
    /// detector resolves a new credential value.
    pub async fn replace(&self, account: Account) {
        self.inner.write().await.insert(account.name.clone(), Arc::new(account));
    }
}
