use super::types::Account;
use crate::error::AlertResult;
use async_trait::async_trait;

/// Supplies the configured upstream accounts for a resolution pass.
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn accounts(&self) -> AlertResult<Vec<Account>>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticAccountSource {
    accounts: Vec<Account>,
}

impl StaticAccountSource {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl AccountSource for StaticAccountSource {
    async fn accounts(&self) -> AlertResult<Vec<Account>> {
        Ok(self.accounts.clone())
    }
}
