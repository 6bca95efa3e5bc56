//! `qrseald` — the QRSEAL server binary.
//!
//! Usage:
//!   qrseald -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/qrseal/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod auth_middleware;
mod bootstrap;
mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use jsonwebtoken::{DecodingKey, Validation};
use qrseal_core::Module;
use tracing::info;

use auth_middleware::JwtState;
use config::ServerConfig;

/// QRSEAL server.
#[derive(Parser, Debug)]
#[command(name = "qrseald", about = "QR sticker issuance server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address.
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    bootstrap::verify_config(&server_config)?;

    // Initialize storage.
    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let core_config = qrseal_core::ServiceConfig {
        data_dir: Some(data_dir.clone()),
        listen: cli.listen.clone(),
        ..Default::default()
    };

    // Embedded stores shared by the modules.
    let kv: Arc<dyn qrseal_kv::KVStore> = Arc::new(
        qrseal_kv::RedbStore::open(&core_config.resolve_db_path())
            .map_err(|e| anyhow::anyhow!("failed to open KV store: {}", e))?,
    );
    let sql: Arc<dyn qrseal_sql::SQLStore> = Arc::new(
        qrseal_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    let blob: Arc<dyn qrseal_blob::BlobStore> = Arc::new(
        qrseal_blob::FileStore::open(
            &core_config.resolve_blob_dir(),
            &server_config.artifacts.base_url,
        )
        .map_err(|e| anyhow::anyhow!("failed to open blob store: {}", e))?,
    );
    let renderer: Arc<dyn qrseal_render::Renderer> = Arc::new(qrseal_render::PlainRenderer);

    // ── Modules ──

    let refdata_service = Arc::new(refdata::RefdataService::new(Arc::clone(&kv)));
    let refdata_module = refdata::RefdataModule::new(Arc::clone(&refdata_service));
    info!("Refdata module initialized");

    let issuance_service = Arc::new(
        issuance::IssuanceService::new(
            Arc::clone(&sql),
            Arc::clone(&refdata_service),
            renderer,
            Arc::clone(&blob),
            &server_config.payload.origin,
        )
        .map_err(|e| anyhow::anyhow!("failed to initialize issuance service: {}", e))?,
    );
    let issuance_module = issuance::IssuanceModule::new(Arc::clone(&issuance_service));
    info!("Issuance module initialized");

    // Generation worker pool. The token stops the pool; it lives as long
    // as the server does.
    let _worker_cancel =
        issuance::worker::start(Arc::clone(&issuance_service), server_config.worker_config());

    let module_routes = vec![
        (refdata_module.name(), refdata_module.routes()),
        (issuance_module.name(), issuance_module.routes()),
    ];

    // JWT state for the auth middleware.
    let jwt_state = Arc::new(JwtState {
        decoding_key: DecodingKey::from_secret(server_config.jwt.secret.as_bytes()),
        validation: Validation::default(),
    });

    // Build router and serve.
    let app = routes::build_router(jwt_state, module_routes);

    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!("qrseald listening on {}", cli.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
