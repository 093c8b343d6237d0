//! ricewatch - field observation backend for rice crop monitoring

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ricewatch::{
    auth::{GoogleVerifier, JwtValidator},
    config::Args,
    db::MongoClient,
    server,
    sheets::{
        spawn_sync_workers, GoogleSheetsClient, MongoRegistrations, RegistrationSource,
        SheetSyncEngine, SheetsApi,
    },
    storage::StorageClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ricewatch={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  ricewatch - field observation API");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Storage bucket: {}", args.storage_bucket);
    info!("Sync workers: {} (queue {})", args.sync_worker_count, args.sync_queue_size);
    info!("======================================");

    // Connect to MongoDB
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    // Object storage client for media uploads
    let storage = Arc::new(StorageClient::new(
        args.storage_api_url.clone(),
        args.storage_bucket.clone(),
        args.google_access_token.clone(),
    ));

    // Spreadsheet sync engine over the values API
    let sheets_client: Arc<dyn SheetsApi> = Arc::new(GoogleSheetsClient::new(
        args.sheets_api_url.clone(),
        args.google_access_token.clone(),
    ));
    let registrations: Arc<dyn RegistrationSource> =
        Arc::new(MongoRegistrations::new(mongo.clone()));
    let sync_engine = Arc::new(SheetSyncEngine::new(registrations, sheets_client));

    // Make sure every registered spreadsheet has its header row.
    // Per-sheet failures are logged and do not block startup.
    sync_engine.ensure_all_headers().await;

    // Bounded worker pool draining sync jobs off the request path
    let sync_queue = spawn_sync_workers(
        Arc::clone(&sync_engine),
        args.sync_worker_count,
        args.sync_queue_size,
    );

    let jwt = JwtValidator::new(
        &args.jwt_secret(),
        args.jwt_expiry_seconds,
        args.jwt_refresh_expiry_seconds,
    );
    let google = GoogleVerifier::new(args.google_api_key.clone());

    let state = Arc::new(server::AppState {
        args,
        mongo,
        storage,
        jwt,
        google,
        sync_queue,
    });

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
