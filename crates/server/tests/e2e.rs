use std::net::SocketAddr;
use std::sync::Arc;

use common::utils::logging::{Logger, TracingLogger};
use configs::{AppConfig, EntityConfig, StorageConfig};
use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use service::storage::DocumentStore;
use tokio::net::TcpListener;
use uuid::Uuid;

struct TestApp {
    base_url: String,
    data_file: std::path::PathBuf,
}

async fn start_server() -> anyhow::Result<TestApp> {
    let data_file = std::env::temp_dir().join(format!("crudbase_e2e_{}/records.json", Uuid::new_v4()));
    let mut cfg = AppConfig::default();
    cfg.storage = StorageConfig { data_file: Some(data_file.to_string_lossy().into_owned()) };
    let mut members = EntityConfig::new("Member");
    members.required.push("name".into());
    cfg.entities.push(members);

    let store: DocumentStore = server::startup::open_store(&cfg.storage).await?;
    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    let app = server::build_app(&cfg, &store, logger);

    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("server error: {}", e);
        }
    });

    Ok(TestApp { base_url, data_file })
}

#[tokio::test]
async fn e2e_public_health() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = reqwest::get(format!("{}/health", app.base_url)).await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn e2e_members_persist_soft_deletes_to_disk() -> anyhow::Result<()> {
    let app = start_server().await?;
    let client = reqwest::Client::new();
    let url = format!("{}/api/members", app.base_url);

    let created: Value = client
        .post(&url)
        .header("x-actor-id", "e2e")
        .json(&json!({"name": "Bob"}))
        .send()
        .await?
        .json()
        .await?;
    let id = created["_id"].as_str().unwrap_or_default().to_string();
    assert!(!id.is_empty());

    let listed: Value = client.get(format!("{url}?pagination=false")).send().await?.json().await?;
    assert_eq!(listed["results"].as_array().map(Vec::len), Some(1));

    let res = client.delete(format!("{url}/{id}")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    let res = client.get(format!("{url}/{id}")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await?;
    assert_eq!(body["ERROR"]["code"], "NOT_FOUND");

    let on_disk: Value = serde_json::from_slice(&tokio::fs::read(&app.data_file).await?)?;
    let saved = on_disk["members"]
        .as_array()
        .and_then(|docs| docs.iter().find(|d| d["_id"] == json!(id)))
        .cloned()
        .unwrap_or_default();
    assert_eq!(saved["deleted"], json!(true));
    assert_eq!(saved["name"], "Bob");

    if let Some(dir) = app.data_file.parent() {
        let _ = tokio::fs::remove_dir_all(dir).await;
    }
    Ok(())
}
