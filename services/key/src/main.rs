use anyhow::Context;
use key_service::config::{Config, StoreBackend};
use key_service::gateway::{self, GatewayConfig};
use key_service::shutdown::{serve_with_shutdown, wait_for_signal};
use key_service::store::{KeyStore, MemoryKeyStore, RedisKeyStore};
use key_service::telemetry::{init_tracing, TelemetryConfig};
use key_service::KeyLifecycleService;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let telemetry = TelemetryConfig::from(&config);
    if let Err(e) = init_tracing(&telemetry) {
        eprintln!("failed to initialize tracing: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        service = %telemetry.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting Key Service"
    );

    match run(config).await {
        Ok(()) => {
            info!("goodbye");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Key Service failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn KeyStore> = match &config.store {
        StoreBackend::Redis { url, namespace } => Arc::new(
            RedisKeyStore::connect(url, namespace.clone())
                .await
                .context("failed to initialize redis store")?,
        ),
        StoreBackend::Memory => Arc::new(MemoryKeyStore::new()),
    };
    info!(backend = store.backend(), "Key store ready");

    let service = KeyLifecycleService::new(store, config.key_generator()?);
    let app = gateway::router(service, &GatewayConfig::from(&config));

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(addr = %addr, "Key Service listening");

    serve_with_shutdown(listener, app, wait_for_signal(), config.shutdown_timeout)
        .await
        .context("HTTP server run failure")?;

    info!("Key Service stopped");
    Ok(())
}
