//!
//! src/probe.rs
//!
//! Optional storage backend and the connectivity report served at /test.
//! The storage handle is built once at startup; the report never fails,
//! every problem becomes a status string
//!

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite, sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions};

use crate::config::StorageConfig;
use crate::errors::ServiceError;

const MAX_COLLECTIONS: usize = 10;
const MAX_ERROR_CHARS: usize = 50;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Names of the collections (tables) the backend holds
    async fn list_collections(&self) -> Result<Vec<String>, ServiceError>;
}

pub struct SqliteStorage {
    pool: Pool<Sqlite>
}

impl SqliteStorage {
    /// Pool connects on first use, so only a malformed url fails here
    pub fn connect_lazy(database_url: &str) -> Result<Self, ServiceError> {
        let options = SqliteConnectOptions::from_str(database_url)?;
        let pool = SqlitePoolOptions::new()
            .min_connections(0)
            .max_connections(2)
            .connect_lazy_with(options);
        Ok( Self { pool } )
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn list_collections(&self) -> Result<Vec<String>, ServiceError> {
        let names: Vec<String> = sqlx::query_scalar(
            r"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }
}

/// The storage dependency as injected at startup
#[derive(Clone)]
pub enum StorageSlot {
    NotConfigured,
    Ready(Arc<dyn Storage>),
    Failed(String),
}

impl StorageSlot {
    pub fn from_config(cfg: &StorageConfig) -> Self {
        let Some(url) = cfg.database_url.as_deref() else {
            return StorageSlot::NotConfigured;
        };
        match SqliteStorage::connect_lazy(url) {
            Ok(storage) => StorageSlot::Ready(Arc::new(storage)),
            Err(e) => {
                tracing::warn!(error = %e, "storage.init.failed");
                StorageSlot::Failed(e.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageStatus {
    Connected { collections: Vec<String> },
    NotConfigured,
    /// `handle_open` is false when the handle could not be built at all
    Error { message: String, handle_open: bool },
}

pub async fn check(slot: &StorageSlot) -> StorageStatus {
    match slot {
        StorageSlot::NotConfigured => StorageStatus::NotConfigured,
        StorageSlot::Failed(message) => StorageStatus::Error {
            message: message.clone(),
            handle_open: false
        },
        StorageSlot::Ready(storage) => match storage.list_collections().await {
            Ok(collections) => StorageStatus::Connected { collections },
            Err(e) => StorageStatus::Error { message: e.to_string(), handle_open: true },
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub backend: String,
    pub database: String,
    pub database_url: String,
    pub database_name: String,
    pub connection_status: String,
    pub collections: Vec<String>,
}

fn clip(message: &str) -> String {
    message.chars().take(MAX_ERROR_CHARS).collect()
}

fn presence(value: &Option<String>) -> String {
    if value.is_some() { "✅ Set" } else { "❌ Not Set" }.to_string()
}

pub fn render(status: StorageStatus, cfg: &StorageConfig) -> ProbeReport {
    let mut report = ProbeReport {
        backend: "✅ Running".to_string(),
        database: "❌ Not Available".to_string(),
        database_url: presence(&cfg.database_url),
        database_name: presence(&cfg.database_name),
        connection_status: "Not Connected".to_string(),
        collections: Vec::new(),
    };

    match status {
        StorageStatus::Connected { mut collections } => {
            collections.truncate(MAX_COLLECTIONS);
            report.database = "✅ Connected & Working".to_string();
            report.connection_status = "Connected".to_string();
            report.collections = collections;
        },
        StorageStatus::NotConfigured => {
            report.database =
                "❌ Database module not found (run enable-database first)".to_string();
        },
        StorageStatus::Error { message, handle_open: true } => {
            report.database = format!("⚠️  Connected but Error: {}", clip(&message));
            report.connection_status = "Connected".to_string();
        },
        StorageStatus::Error { message, handle_open: false } => {
            report.database = format!("❌ Error: {}", clip(&message));
        },
    }
    report
}

pub async fn probe(slot: &StorageSlot, cfg: &StorageConfig) -> ProbeReport {
    let status = check(slot).await;
    tracing::debug!(status = ?status, "probe.storage");
    render(status, cfg)
}
