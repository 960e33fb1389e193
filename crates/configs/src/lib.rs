use std::collections::{BTreeMap, HashSet};

use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

/// Verbs an entity may list under `disabled`.
pub const VERBS: [&str; 5] = ["create", "list", "read", "update", "delete"];

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// JSON file backing the document store; in-memory only when absent.
    #[serde(default)]
    pub data_file: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutesConfig {
    /// Path fragments whose request bodies are never logged.
    #[serde(default = "default_sensitive")]
    pub sensitive: Vec<String>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self { sensitive: default_sensitive() }
    }
}

/// Route fragments whose request bodies are blanked in request logs.
pub fn default_sensitive() -> Vec<String> {
    ["register", "login", "change-pass", "forgot-pass", "reset-pass", "set-password"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_soft_delete")]
    pub soft_delete: bool,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub relations: BTreeMap<String, String>,
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_soft_delete() -> bool { true }

impl EntityConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: None,
            path: None,
            soft_delete: true,
            required: Vec::new(),
            relations: BTreeMap::new(),
            disabled: Vec::new(),
        }
    }

    /// Collection name, defaulting to the lower-cased entity name plus `s`.
    pub fn collection_name(&self) -> String {
        self.collection
            .clone()
            .unwrap_or_else(|| format!("{}s", self.name.to_lowercase()))
    }

    /// Mount path segment under `/api`, defaulting to the collection name.
    pub fn mount_path(&self) -> String {
        let raw = self.path.clone().unwrap_or_else(|| self.collection_name());
        raw.trim_matches('/').to_string()
    }
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Loads `CONFIG_PATH` (default `config.toml`), then normalizes and
    /// validates. A missing file yields defaults overridden by
    /// `SERVER_HOST` / `SERVER_PORT`.
    pub fn load_or_default() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            let mut cfg = AppConfig::default();
            if let Ok(host) = std::env::var("SERVER_HOST") {
                cfg.server.host = host;
            }
            if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
                cfg.server.port = port;
            }
            cfg
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.validate_entities()?;
        Ok(())
    }

    fn validate_entities(&self) -> Result<()> {
        let collections: HashSet<String> = self.entities.iter().map(|e| e.collection_name()).collect();
        let mut paths = HashSet::new();
        for entity in &self.entities {
            if entity.name.trim().is_empty() {
                return Err(anyhow!("entities[].name must not be empty"));
            }
            let path = entity.mount_path();
            if path.is_empty() {
                return Err(anyhow!("entity {} has an empty mount path", entity.name));
            }
            if !paths.insert(path.clone()) {
                return Err(anyhow!("mount path /api/{path} is used by more than one entity"));
            }
            for (field, target) in &entity.relations {
                if !collections.contains(target) {
                    return Err(anyhow!(
                        "entity {}: relation {field} targets unknown collection {target}",
                        entity.name
                    ));
                }
            }
            for verb in &entity.disabled {
                if !VERBS.contains(&verb.as_str()) {
                    return Err(anyhow!("entity {}: unknown verb {verb} in disabled", entity.name));
                }
            }
        }
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}
