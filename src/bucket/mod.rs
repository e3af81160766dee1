//! Object storage - where the source documents live
//!
//! Two backends implement [`ObjectStore`]:
//! - [`S3Store`]: an S3 bucket (or any S3-compatible endpoint)
//! - [`LocalStore`]: a directory on disk, keys are `/`-separated relative paths

pub mod local;
pub mod s3;

pub use local::LocalStore;
pub use s3::S3Store;

use crate::Result;
use crate::config::RagConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An object listed from a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
}

/// Minimal object storage interface used by ingestion and upload
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store name used in chunk URIs (the bucket name)
    fn name(&self) -> &str;

    /// List every object under `prefix`, sorted by key
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Fetch an object's bytes
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Create or replace an object
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
}

/// Build the store selected by configuration
pub async fn from_config(config: &RagConfig) -> Result<Arc<dyn ObjectStore>> {
    match &config.storage.local_dir {
        Some(dir) => {
            tracing::info!("Using local document store at {}", dir.display());
            Ok(Arc::new(LocalStore::new(dir.clone(), config.store_name())))
        }
        None => {
            tracing::info!(
                "Using S3 bucket {} ({})",
                config.storage.bucket,
                config.storage.region
            );
            let store = S3Store::connect(
                &config.storage.bucket,
                &config.storage.region,
                config.storage.endpoint_url.as_deref(),
            )
            .await;
            Ok(Arc::new(store))
        }
    }
}
