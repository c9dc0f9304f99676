use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::args::Cli;
use crate::codes::client::CodeSource;
use crate::constants::{BETWEEN_CODES_DELAY, USER_AGENT};
use crate::notify::Notifier;
use crate::store::{Config, JsonStore, SentHistory};

/// Builds the shared outbound client. Per-request timeouts are applied at each call site.
pub fn http_client() -> reqwest::Result<Client> {
    Client::builder().user_agent(USER_AGENT).build()
}

/// Handle to the background poll task
#[derive(Debug)]
pub struct PollerHandle {
    pub handle: JoinHandle<()>,
    pub cancellation_token: CancellationToken,
}

impl PollerHandle {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Everything the poll loop and the route handlers share.
///
/// Built once at startup and handed around as `Arc<AppState>`. Config and history are only
/// touched through their locks; no lock is held across an outbound request.
#[derive(Debug)]
pub struct AppState {
    pub store: JsonStore,
    pub config: RwLock<Config>,
    pub history: Mutex<SentHistory>,
    pub source: CodeSource,
    pub notifier: Notifier,

    /// Pause between two new codes within a check
    pub code_delay: Duration,

    /// Serializes check cycles (scheduled and manual)
    pub check_guard: Mutex<()>,
    pub last_check: RwLock<Option<DateTime<Utc>>>,
    pub poller: std::sync::Mutex<Option<PollerHandle>>,
}

impl AppState {
    pub fn new(
        store: JsonStore,
        config: Config,
        history: SentHistory,
        source: CodeSource,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            config: RwLock::new(config),
            history: Mutex::new(history),
            source,
            notifier,
            code_delay: BETWEEN_CODES_DELAY,
            check_guard: Mutex::new(()),
            last_check: RwLock::new(None),
            poller: std::sync::Mutex::new(None),
        }
    }

    /// Loads both documents and wires up the outbound clients from CLI/env settings
    pub async fn from_cli(cli: &Cli) -> reqwest::Result<Arc<Self>> {
        let store = JsonStore::new(&cli.config_path, &cli.codes_path);
        let config = store.load_config().await;
        let history = store.load_history().await;

        let client = http_client()?;
        let source = CodeSource::new(client.clone(), cli.codes_api_base.clone());
        let notifier = Notifier::new(client, cli.stats_url.clone(), cli.avatar_base_url.clone());

        Ok(Arc::new(Self::new(store, config, history, source, notifier)))
    }

    pub async fn config_snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    pub fn poller_running(&self) -> bool {
        match self.poller.lock() {
            Ok(guard) => guard.as_ref().is_some_and(PollerHandle::is_running),
            Err(_) => false,
        }
    }

    /// Signals the poll task to stop and waits for it to exit
    pub async fn stop_poller(&self) {
        let handle = match self.poller.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        if let Some(poller) = handle {
            poller.cancellation_token.cancel();
            match tokio::time::timeout(Duration::from_secs(5), poller.handle).await {
                Ok(Ok(())) => tracing::info!("poller stopped"),
                Ok(Err(e)) => tracing::error!(error = ?e, "poller task panicked"),
                Err(_) => tracing::warn!("timeout waiting for poller to stop"),
            }
        }
    }
}
