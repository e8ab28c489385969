//! API server entry point.

use api::Runtime;
use api::config::Config;
use api::error::StartupError;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: OrderStore + Clone + 'static>(
    store: S,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), StartupError> {
    let runtime = Runtime::start(store, config).await?;
    let app = runtime.router(metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runtime.shutdown().await;
    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresOrderStore::connect(url).await?;
            store.run_migrations().await?;
            tracing::info!("using Postgres order store");
            serve(store, &config, metrics_handle).await
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory order store");
            serve(InMemoryOrderStore::new(), &config, metrics_handle).await
        }
    }
}
