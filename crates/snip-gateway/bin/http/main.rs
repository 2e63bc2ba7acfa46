mod cli;

use crate::cli::{Cli, StorageBackendArg};
use anyhow::Context;
use clap::Parser;
use snip_core::Repository;
use snip_deleter::UrlDeleter;
use snip_gateway::{App, AppState};
use snip_generator::RandomGenerator;
use snip_shortener::ShortenerService;
use snip_storage::{FileRepository, InMemoryRepository, MySqlRepository};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        listen_addr = %cli.listen_addr,
        base_url = %cli.base_url,
        storage_backend = %cli.storage,
        "starting snip gateway"
    );

    match cli.storage {
        StorageBackendArg::InMemory => run(cli, InMemoryRepository::new()).await,
        StorageBackendArg::File => {
            let repository = FileRepository::open(&cli.file_path)
                .await
                .with_context(|| format!("failed to open {}", cli.file_path.display()))?;
            run(cli, repository).await
        }
        StorageBackendArg::Mysql => {
            let dsn = cli
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(dsn)
                .await
                .context("failed to connect to mysql")?;
            repository.migrate().await.context("failed to migrate mysql")?;
            run(cli, repository).await
        }
    }
}

async fn run<R: Repository>(cli: Cli, repository: R) -> anyhow::Result<()> {
    let repository = Arc::new(repository);

    let deleter = Arc::new(UrlDeleter::new(
        cli.deleter_config(),
        Arc::clone(&repository),
    ));
    deleter.start()?;

    let shortener = Arc::new(ShortenerService::new(
        Arc::clone(&repository),
        RandomGenerator::new(cli.code_length),
    ));

    let state = AppState::new(shortener, deleter.clone(), cli.base_url)
        .with_trusted_subnet(cli.trusted_subnet);

    let listener = tokio::net::TcpListener::bind(cli.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "http server listening");

    let served = axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Pending deletions are flushed even if the server failed.
    deleter.stop().await;
    served?;

    info!("snip gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
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
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
