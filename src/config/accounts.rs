//! Account source backed by the configuration file.

use super::ConfigManager;
use crate::clock::{elapsed_since, SharedClock};
use crate::error::{AlertError, AlertResult};
use crate::resolver::{Account, AccountSource};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct ReloadState {
    accounts: Vec<Account>,
    loaded: bool,
    checked_at: Option<DateTime<Local>>,
}

/// Re-reads `jjz_accounts` from the config file at most once per interval.
///
/// A failed reload keeps serving the last good list; it only surfaces as an
/// error while no list has ever loaded.
#[derive(Debug)]
pub struct ReloadingAccountSource {
    path: PathBuf,
    interval: Duration,
    clock: SharedClock,
    state: Mutex<ReloadState>,
}

impl ReloadingAccountSource {
    /// Start empty; the first call loads the file.
    pub fn new(path: impl Into<PathBuf>, clock: SharedClock) -> Self {
        Self {
            path: path.into(),
            interval: DEFAULT_RELOAD_INTERVAL,
            clock,
            state: Mutex::new(ReloadState {
                accounts: Vec::new(),
                loaded: false,
                checked_at: None,
            }),
        }
    }

    /// Start from accounts already loaded at startup.
    pub fn seeded(path: impl Into<PathBuf>, accounts: Vec<Account>, clock: SharedClock) -> Self {
        let source = Self::new(path, clock);
        {
            let mut state = source.state.lock();
            state.accounts = accounts;
            state.loaded = true;
            state.checked_at = Some(source.clock.now());
        }
        source
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn is_due(&self) -> bool {
        let state = self.state.lock();
        match state.checked_at {
            Some(at) if state.loaded => elapsed_since(self.clock.as_ref(), at) >= self.interval,
            _ => true,
        }
    }

    async fn reload(&self) -> AlertResult<Vec<Account>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || ConfigManager::load_from_path(path))
            .await
            .map_err(|e| AlertError::Internal(format!("config reload task failed: {e}")))?
            .map(|manager| manager.config().accounts())
    }
}

#[async_trait]
impl AccountSource for ReloadingAccountSource {
    async fn accounts(&self) -> AlertResult<Vec<Account>> {
        if !self.is_due() {
            return Ok(self.state.lock().accounts.clone());
        }

        let result = self.reload().await;
        let mut state = self.state.lock();
        state.checked_at = Some(self.clock.now());

        match result {
            Ok(accounts) => {
                if accounts.len() != state.accounts.len() {
                    info!(
                        path = %self.path.display(),
                        accounts = accounts.len(),
                        "🔄 Account list reloaded"
                    );
                } else {
                    debug!(accounts = accounts.len(), "Account list unchanged in size");
                }
                state.accounts = accounts;
                state.loaded = true;
                Ok(state.accounts.clone())
            }
            Err(err) if state.loaded => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Account reload failed, keeping last good list"
                );
                Ok(state.accounts.clone())
            }
            Err(err) => Err(err),
        }
    }
}
