use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use passreset_backend_lib::{
    clock::SystemClock,
    config::{LogFormat, Settings, StorageBackend},
    delivery::MailDelivery,
    directory::StaticDirectory,
    otp::OtpService,
    router,
    storage::{FlatFileStore, MemoryStore, OtpStore},
    sweeper, AppState,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Password-reset OTP service
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file (toml, yaml or json); defaults to ./passreset.*
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Settings::load().context("loading configuration")?,
    };
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }

    init_tracing(&settings);

    let policy = settings.otp.policy();

    let store: Arc<dyn OtpStore> = match settings.storage {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => Arc::new(FlatFileStore::new(&settings.data_dir)?),
    };
    let directory = Arc::new(StaticDirectory::load_json(&settings.directory_file)?);
    let delivery = Arc::new(MailDelivery::from_settings(&settings.mail, policy.ttl)?);

    let otp = OtpService::new(store, directory, delivery, Arc::new(SystemClock), policy);
    let sweep_every = settings.otp.sweep_interval();
    let addr = settings.bind_addr;
    let state = Arc::new(AppState::new(otp, settings));

    let sweeper = sweeper::spawn(Arc::clone(&state), sweep_every);
    let app = router::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("server stopped");
    Ok(())
}

fn init_tracing(settings: &Settings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    match settings.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
