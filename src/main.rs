//! GlobalProxy server binary

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use globalproxy::config::{Config, LogConfig};
use globalproxy::proxy::ProxyServer;

#[tokio::main]
async fn main() -> globalproxy::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.proxy.bind_addr(),
        public_scheme = config.proxy.public_scheme.as_str(),
        strip_header_prefixes = ?config.proxy.strip_header_prefixes,
        egress_proxy = config.proxy.egress_proxy.is_some(),
        "Starting GlobalProxy"
    );

    let server = ProxyServer::new(config.proxy)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(shutdown_rx).await {
            error!(error = %e, "Proxy server exited with error");
        }
    });

    wait_for_shutdown().await;
    info!("Shutdown requested, draining connections");

    let _ = shutdown_tx.send(true);
    let _ = server_task.await;
    Ok(())
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL` applies to this crate
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("globalproxy={},tower_http=info", log.level)));

    let registry = tracing_subscriber::registry().with(filter);
    match log.format.to_ascii_lowercase().as_str() {
        "pretty" => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
async fn wait_for_shutdown() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
