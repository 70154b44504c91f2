mod config;
mod handlers;
mod logging;
mod metrics;

use anyhow::{Context, Result, bail};
use clap::Parser;
use config::{BackendConfig, Cli, Config};
use handlers::AppState;
use pvc_plumber_backends::{Backend, KopiaBackend, S3Backend};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info};

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(cli).context("Failed to load configuration")?;

    logging::init_tracing(&config.log_level)?;

    info!(
        backend = %config.backend.kind(),
        port = config.port,
        log_level = %config.log_level,
        http_timeout_ms = config.http_timeout.as_millis() as u64,
        "starting pvc-plumber"
    );

    let backend = build_backend(&config.backend).await?;
    info!(backend = %backend.backend_kind(), "backend ready");
    let app = handlers::router(AppState::new(backend));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "server starting");

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutting down server");
            let _ = signalled_tx.send(());
        })
        .into_future();

    // In-flight requests get SHUTDOWN_DEADLINE to finish once a signal arrives.
    let deadline = async move {
        match signalled_rx.await {
            Ok(()) => tokio::time::sleep(SHUTDOWN_DEADLINE).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                return Err(e).context("Server error");
            }
        }
        _ = deadline => {
            error!("server forced to shutdown");
            bail!("in-flight requests did not finish within {:?}", SHUTDOWN_DEADLINE);
        }
    }

    info!("server stopped");
    Ok(())
}

async fn build_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    match config {
        BackendConfig::S3(s3) => {
            info!(
                endpoint = %s3.endpoint,
                bucket = %s3.bucket,
                secure = s3.secure,
                "initializing s3 backend"
            );
            let backend = S3Backend::new(s3)
                .inspect_err(|e| error!(error = %e, "failed to create S3 client"))
                .context("Failed to create S3 client")?;
            Ok(Arc::new(backend))
        }
        BackendConfig::KopiaFs(kopia) => {
            info!(path = %kopia.repository_path.display(), "initializing kopia-fs backend");
            let mut backend = KopiaBackend::new(kopia.clone());
            backend
                .connect()
                .await
                .context("Failed to connect to kopia repository")?;
            Ok(Arc::new(backend))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
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
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
