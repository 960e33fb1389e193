use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use common::env::ensure_data_dir;
use common::utils::logging::{init_logging_default, init_logging_json, Logger, TracingLogger};
use configs::{AppConfig, EntityConfig, LogFormat, StorageConfig};
use dotenvy::dotenv;
use service::storage::{DocumentStore, Schema};
use service::RecordStore;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::binder::{RouteBinder, Verb};
use crate::errors::StartupError;
use crate::routes;

/// Initialize logging in the configured format
pub fn init_logging(format: LogFormat) {
    match format {
        LogFormat::Compact => init_logging_default(),
        LogFormat::Json => init_logging_json(),
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

pub fn schema_for(entity: &EntityConfig) -> Schema {
    let mut schema = Schema::new(entity.name.clone(), entity.collection_name()).soft_delete(entity.soft_delete);
    for field in &entity.required {
        schema = schema.require(field.clone());
    }
    for (field, target) in &entity.relations {
        schema = schema.relation(field.clone(), target.clone());
    }
    schema
}

/// File-backed when `data_file` is set, in-memory otherwise.
pub async fn open_store(storage: &StorageConfig) -> Result<DocumentStore, StartupError> {
    match &storage.data_file {
        Some(path) => {
            ensure_data_dir(path).await?;
            DocumentStore::open(path).await.map_err(|e| StartupError::Storage(e.to_string()))
        }
        None => {
            warn!("storage.data_file not set; records are kept in memory only");
            Ok(DocumentStore::in_memory())
        }
    }
}

/// One `(mount path, router)` per configured entity.
pub fn entity_routers(config: &AppConfig, store: &DocumentStore, logger: Arc<dyn Logger>) -> Vec<(String, Router)> {
    config
        .entities
        .iter()
        .map(|entity| {
            let collection = Arc::new(store.collection(schema_for(entity)));
            let records = RecordStore::new(collection, Arc::clone(&logger));
            let binder = entity
                .disabled
                .iter()
                .filter_map(|v| Verb::parse(v))
                .fold(RouteBinder::new(records, Arc::clone(&logger)), RouteBinder::disable)
                .sensitive_routes(config.routes.sensitive.clone());
            (entity.mount_path(), binder.into_router())
        })
        .collect()
}

pub fn build_app(config: &AppConfig, store: &DocumentStore, logger: Arc<dyn Logger>) -> Router {
    routes::build_router(entity_routers(config, store, logger), build_cors())
}

fn bind_addr(config: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("server address: {e}")))
}

/// Public entry: load configuration, set up logging and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    let config = AppConfig::load_or_default()?;
    init_logging(config.logging.format);
    run_with(config).await
}

/// Serve `config`. Logging must already be initialized by the caller.
pub async fn run_with(config: AppConfig) -> anyhow::Result<()> {
    let store = open_store(&config.storage).await?;
    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    let app = build_app(&config, &store, logger);

    let addr = bind_addr(&config)?;
    info!(%addr, entities = config.entities.len(), "starting crud server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
