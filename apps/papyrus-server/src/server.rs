use std::future::Future;
use std::time::Duration;

use anyhow::{Context as _, Result};
use axum::Router;
use sea_orm::{ConnectOptions, ConnectionTrait as _, Database, DatabaseConnection};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{AppConfig, DatabaseConfig};

/// Open the configured database.
///
/// # Errors
/// Connection failures.
pub async fn connect(cfg: &DatabaseConfig) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(cfg.dsn.clone());
    opts.max_connections(cfg.max_connections)
        .sqlx_logging(false);
    if !cfg.sqlite_extensions.is_empty() {
        let extensions = cfg.sqlite_extensions.clone();
        opts.map_sqlx_sqlite_opts(move |sqlite| {
            extensions
                .iter()
                .fold(sqlite, |sqlite, ext| sqlite.extension(ext.clone()))
        });
    }
    let db = Database::connect(opts)
        .await
        .with_context(|| format!("cannot connect to `{}`", cfg.dsn))?;
    info!(backend = ?db.get_database_backend(), "database connected");
    Ok(db)
}

/// Router with every resource mounted and request tracing on top.
///
/// # Errors
/// A resource failed to register.
pub fn build_app(db: DatabaseConnection, cfg: &AppConfig) -> Result<Router> {
    let (router, routes) = spots::register(Router::new(), db, &cfg.spots)?;
    for route in &routes {
        tracing::debug!(name = %route.name, method = %route.method, path = %route.path, "route");
    }
    Ok(router.layer(TraceLayer::new_for_http()))
}

/// Connect, migrate and serve until `shutdown` resolves. In-flight requests
/// get `server.shutdown_timeout` to finish.
///
/// # Errors
/// Database, bind or serve failures.
pub async fn run<F>(cfg: &AppConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = cfg.server.socket_addr()?;
    let db = connect(&cfg.database).await?;
    if cfg.database.run_migrations {
        spots::migrate(&db).await?;
    }
    let app = build_app(db, cfg)?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("HTTP server bound on {}", addr);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let graceful = async move {
        shutdown.await;
        info!("HTTP server shutting down gracefully");
        if stop_tx.send(()).is_err() {
            tracing::debug!("server finished before the shutdown signal");
        }
    };
    let serve = axum::serve(listener, app).with_graceful_shutdown(graceful);

    drain(serve.into_future(), stop_rx, cfg.server.shutdown_timeout).await
}

/// Wait for the server, but give up `timeout` after the shutdown signal.
async fn drain<S>(
    serve: S,
    stop_rx: tokio::sync::oneshot::Receiver<()>,
    timeout: Duration,
) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(serve);
    tokio::select! {
        res = &mut serve => return res.context("HTTP server failed"),
        _ = stop_rx => {}
    }
    match tokio::time::timeout(timeout, &mut serve).await {
        Ok(res) => res.context("HTTP server failed"),
        Err(_) => {
            tracing::warn!(?timeout, "shutdown timeout elapsed, dropping open connections");
            Ok(())
        }
    }
}
