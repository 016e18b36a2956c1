use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StorageBackend};
use crate::services::content_service::ContentStore;
use crate::store::{mongo::ping_with_timeout, MemoryStore, MongoStore, Store};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub content: Arc<ContentStore>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match config.storage_backend {
            StorageBackend::Mongo => {
                tracing::info!("Connecting to MongoDB...");
                let mongo = MongoStore::connect(&config.mongo_uri, &config.mongo_database).await?;
                ping_with_timeout(&mongo, Duration::from_secs(5)).await?;
                mongo.ensure_indexes().await?;
                tracing::info!("MongoDB connection established successfully");
                Arc::new(mongo)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory store, data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let content = ContentStore::load_dir(&config.content_dir)?;
        Ok(Self::from_parts(config, store, content))
    }

    pub fn from_parts(config: Config, store: Arc<dyn Store>, content: ContentStore) -> Self {
        Self {
            config,
            store,
            content: Arc::new(content),
        }
    }
}

pub mod answer_verifier;
pub mod content_service;
pub mod exercise_service;
pub mod points_service;
pub mod progress_service;
pub mod streak_service;
