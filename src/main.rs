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

use astral_server::adapters::database::{self, PgUserRepository};
use astral_server::adapters::redis::RedisClient;
use astral_server::config::{Config, SessionBackend};
use astral_server::{AppBuilder, api, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let boot_span = tracing::info_span!("boot_server");
    let (listener, app_router, shutdown_tx, shutdown_rx, workers) = async {
        // Phase 1: Infrastructure Setup (Resources)
        let pool = database::init_pool(&config.database).await?;
        sqlx::migrate!().run(&pool).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        astral_server::spawn_signal_handler(shutdown_tx.clone());

        // Phase 2: Component Wiring
        let mut builder = AppBuilder::new(config.clone()).with_users(Arc::new(PgUserRepository::new(pool)));
        if config.sessions.backend == SessionBackend::Redis {
            builder = builder.with_redis(RedisClient::new(&config.sessions).await?);
        }
        let app = builder.build()?;

        // Phase 3: Listener and Router
        let app_router = api::app_router(&config.server, app.state);
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        tracing::info!(address = %addr, backend = ?config.sessions.backend, "listening");
        let listener = tokio::net::TcpListener::bind(addr).await?;

        Ok::<_, anyhow::Error>((listener, app_router, shutdown_tx, shutdown_rx, app.workers))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: Start Runtime
    let worker_tasks = workers.spawn_all(shutdown_rx.clone());

    let mut server_rx = shutdown_rx.clone();
    if let Err(e) = axum::serve(listener, app_router)
        .with_graceful_shutdown(async move {
            let _ = server_rx.wait_for(|&s| s).await;
        })
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // Phase 5: Graceful Shutdown
    let _ = shutdown_tx.send(true);
    tokio::select! {
        () = async {
            futures::future::join_all(worker_tasks).await;
        } => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(std::time::Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    telemetry_guard.shutdown();
    Ok(())
}
