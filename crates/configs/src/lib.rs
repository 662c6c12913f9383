use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Optional separate listener for `/healthz` and `/metrics`.
    #[serde(default)]
    pub admin_addr: Option<String>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), worker_threads: Some(4), admin_addr: None }
    }
}

/// Which medium holds the record collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    File,
    ObjectStore,
    Memory,
    Document,
}

impl BackendKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "object_store" | "gcs" => Ok(Self::ObjectStore),
            "memory" => Ok(Self::Memory),
            "document" | "appwrite" => Ok(Self::Document),
            other => Err(anyhow!("unknown storage backend `{other}`")),
        }
    }
}

/// How new record ids are generated by snapshot backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategyKind {
    /// `max(id) + 1`
    #[default]
    Sequential,
    Uuid,
}

impl IdStrategyKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "uuid" => Ok(Self::Uuid),
            other => Err(anyhow!("unknown id strategy `{other}`")),
        }
    }
}

/// What to do when the persisted collection cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionPolicy {
    #[default]
    Fail,
    RecoverEmpty,
}

impl CorruptionPolicy {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "recover_empty" | "recover" => Ok(Self::RecoverEmpty),
            other => Err(anyhow!("unknown corruption policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub id_strategy: IdStrategyKind,
    #[serde(default)]
    pub on_corrupt: CorruptionPolicy,
    #[serde(default)]
    pub file: FileStorageConfig,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub document: DocumentStoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileStorageConfig {
    #[serde(default = "default_data_file")]
    pub path: PathBuf,
}

fn default_data_file() -> PathBuf { PathBuf::from("data/jsonfood.json") }

impl Default for FileStorageConfig {
    fn default() -> Self { Self { path: default_data_file() } }
}

/// Google Cloud Storage object holding the JSON array.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    #[serde(default = "default_gcs_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_object_name")]
    pub object: String,
    /// OAuth2 bearer token; anonymous requests when absent.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Upload with `predefinedAcl=publicRead`.
    #[serde(default)]
    pub public_read: bool,
}

fn default_gcs_endpoint() -> String { "https://storage.googleapis.com".into() }
fn default_object_name() -> String { "jsonfood.json".into() }

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_gcs_endpoint(),
            bucket: String::new(),
            object: default_object_name(),
            access_token: None,
            public_read: false,
        }
    }
}

/// Appwrite database collection.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DocumentStoreConfig {
    /// e.g. `https://cloud.appwrite.io/v1`
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub database_id: String,
    #[serde(default)]
    pub collection_id: String,
}

pub fn config_path() -> PathBuf {
    std::env::var("CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("config.toml"))
}

/// Read the file at `CONFIG_PATH` (default `config.toml`); defaults when it is missing.
pub fn load_default() -> Result<AppConfig> {
    let path = config_path();
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    load_from_file(&path)
}

pub fn load_from_file(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("cannot read {}: {e}", path.display()))?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Apply environment overrides, then validate. `env` looks a variable up by name.
    pub fn normalize_and_validate<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        self.server.normalize(&env)?;
        self.storage.normalize(&env)?;
        self.storage.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = env("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = env("SERVER_PORT") {
            self.port = port.trim().parse().map_err(|_| anyhow!("SERVER_PORT must be a port number"))?;
        }
        if let Some(w) = env("TOKIO_WORKER_THREADS").and_then(|v| v.trim().parse().ok()) {
            self.worker_threads = Some(w);
        }
        if let Some(addr) = env("ADMIN_ADDR") {
            self.admin_addr = Some(addr);
        }
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(w) if w > 0 => {}
            _ => self.worker_threads = Some(4),
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StorageConfig {
    fn normalize(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = env("STORAGE_BACKEND") { self.backend = BackendKind::parse(&v)?; }
        if let Some(v) = env("ID_STRATEGY") { self.id_strategy = IdStrategyKind::parse(&v)?; }
        if let Some(v) = env("ON_CORRUPT") { self.on_corrupt = CorruptionPolicy::parse(&v)?; }
        if let Some(v) = env("DATA_FILE") { self.file.path = PathBuf::from(v); }

        let gcs = &mut self.object_store;
        if let Some(v) = env("GCS_ENDPOINT") { gcs.endpoint = v; }
        if let Some(v) = env("GCS_BUCKET") { gcs.bucket = v; }
        if let Some(v) = env("GCS_OBJECT") { gcs.object = v; }
        if let Some(v) = env("GCS_ACCESS_TOKEN") { gcs.access_token = Some(v); }
        if let Some(v) = env("GCS_PUBLIC_READ") { gcs.public_read = parse_flag("GCS_PUBLIC_READ", &v)?; }
        if gcs.access_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            gcs.access_token = None;
        }

        let doc = &mut self.document;
        if let Some(v) = env("APPWRITE_ENDPOINT") { doc.endpoint = v; }
        if let Some(v) = env("APPWRITE_PROJECT_ID") { doc.project_id = v; }
        if let Some(v) = env("APPWRITE_API_KEY") { doc.api_key = v; }
        if let Some(v) = env("APPWRITE_DATABASE_ID") { doc.database_id = v; }
        if let Some(v) = env("APPWRITE_COLLECTION_ID") { doc.collection_id = v; }
        Ok(())
    }

    /// Only the selected backend's settings are checked.
    pub fn validate(&self) -> Result<()> {
        match self.backend {
            BackendKind::File => {
                if self.file.path.as_os_str().is_empty() {
                    return Err(anyhow!("storage.file.path is empty"));
                }
            }
            BackendKind::Memory => {}
            BackendKind::ObjectStore => {
                let gcs = &self.object_store;
                require_http("storage.object_store.endpoint", &gcs.endpoint)?;
                require("storage.object_store.bucket (GCS_BUCKET)", &gcs.bucket)?;
                require("storage.object_store.object (GCS_OBJECT)", &gcs.object)?;
            }
            BackendKind::Document => {
                let doc = &self.document;
                require_http("storage.document.endpoint (APPWRITE_ENDPOINT)", &doc.endpoint)?;
                require("storage.document.project_id (APPWRITE_PROJECT_ID)", &doc.project_id)?;
                require("storage.document.api_key (APPWRITE_API_KEY)", &doc.api_key)?;
                require("storage.document.database_id (APPWRITE_DATABASE_ID)", &doc.database_id)?;
                require("storage.document.collection_id (APPWRITE_COLLECTION_ID)", &doc.collection_id)?;
            }
        }
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{name} must be true or false, got `{other}`")),
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{name} is empty"));
    }
    Ok(())
}

fn require_http(name: &str, value: &str) -> Result<()> {
    require(name, value)?;
    let lower = value.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(anyhow!("{name} must start with http:// or https://"));
    }
    Ok(())
}
