#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::memory::MemorySessionStore;
use crate::adapters::redis::{RedisClient, RedisSessionStore};
use crate::api::AppState;
use crate::config::{Config, SessionBackend};
use crate::domain::clock::{Clock, SystemClock};
use crate::services::account_service::AccountService;
use crate::services::session_service::SessionService;
use crate::services::session_store::SessionStore;
use crate::services::user_repository::UserRepository;
use crate::workers::SessionSweeper;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Background tasks that run alongside the HTTP server.
#[derive(Debug, Default)]
pub struct Workers {
    sweeper: Option<SessionSweeper>,
}

impl Workers {
    /// Spawns every configured worker. Each stops once `shutdown_rx` flips to `true`.
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        if let Some(sweeper) = self.sweeper {
            tasks.push(tokio::spawn(sweeper.run(shutdown_rx)));
        }
        tasks
    }
}

#[derive(Debug)]
pub struct App {
    pub state: AppState,
    pub workers: Workers,
}

/// Wires stores and services together. Connections are opened by the caller and
/// handed in, so building never touches the network.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    clock: Arc<dyn Clock>,
    users: Option<Arc<dyn UserRepository>>,
    redis: Option<Arc<RedisClient>>,
}

impl AppBuilder {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, clock: Arc::new(SystemClock), users: None, redis: None }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_users(mut self, users: Arc<dyn UserRepository>) -> Self {
        self.users = Some(users);
        self
    }

    #[must_use]
    pub fn with_redis(mut self, redis: Arc<RedisClient>) -> Self {
        self.redis = Some(redis);
        self
    }

    /// # Errors
    /// Returns an error if the configured session backend or the user repository is missing.
    pub fn build(self) -> anyhow::Result<App> {
        let users = self.users.ok_or_else(|| anyhow::anyhow!("user repository is required"))?;
        let sessions = &self.config.sessions;

        let mut workers = Workers::default();
        let store: Arc<dyn SessionStore> = match sessions.backend {
            SessionBackend::Redis => {
                let redis = self.redis.ok_or_else(|| anyhow::anyhow!("redis session backend needs a connection"))?;
                Arc::new(RedisSessionStore::new(redis, sessions.redis_prefix.clone()))
            }
            SessionBackend::Memory => {
                tracing::warn!("Using in-memory session store; sessions are not shared between nodes");
                let store = MemorySessionStore::new(Arc::clone(&self.clock));
                workers.sweeper = Some(SessionSweeper::new(store.clone(), sessions.sweep_interval_secs));
                Arc::new(store)
            }
        };

        let session_service = SessionService::new(&self.config.auth, sessions.store_timeout(), store, self.clock);
        let account_service = AccountService::new(users, session_service.clone());

        Ok(App { state: AppState { session_service, account_service }, workers })
    }
}

/// Flips `shutdown_tx` to `true` on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
            () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
        }

        let _ = shutdown_tx.send(true);
    });
}
