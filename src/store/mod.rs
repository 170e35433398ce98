use crate::config::StoreConfig;
use crate::record::Record;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod lance;
mod memory;
mod qdrant;

pub use lance::LanceStore;
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    Cosine,
    Euclid,
    Dot,
    Manhattan,
}

impl Distance {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclid => "euclid",
            Self::Dot => "dot",
            Self::Manhattan => "manhattan",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "cosine" => Some(Self::Cosine),
            "euclid" => Some(Self::Euclid),
            "dot" => Some(Self::Dot),
            "manhattan" => Some(Self::Manhattan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub name: String,
    pub vector_size: usize,
    pub distance: Distance,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>, vector_size: usize, distance: Distance) -> Self {
        Self {
            name: name.into(),
            vector_size,
            distance,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self::new("test_collection", 128, Distance::Cosine)
    }
}

/// Metadata the store reports for a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub points_count: u64,
    pub vector_size: usize,
    pub distance: Distance,
}

/// What the loader needs from a vector database.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Drops any collection with the same name, then creates it empty.
    async fn recreate_collection(&self, config: &CollectionConfig) -> Result<()>;

    /// Inserts or replaces `records` by id.
    async fn upsert(&self, collection: &str, records: &[Record]) -> Result<()>;

    async fn get_collection(&self, name: &str) -> Result<CollectionInfo>;

    /// Flags existing points as deprecated as of now. Vectors and the rest of the
    /// payload stay as they are.
    async fn mark_deprecated(&self, collection: &str, ids: &[u64]) -> Result<()>;
}

/// Connects the backend named in the configuration.
pub async fn connect(config: &StoreConfig) -> Result<Box<dyn VectorStore>> {
    let store: Box<dyn VectorStore> = match config {
        StoreConfig::Qdrant {
            host,
            port,
            api_key,
            timeout_secs,
        } => Box::new(QdrantStore::new(
            &format!("http://{host}:{port}"),
            api_key.clone(),
            *timeout_secs,
        )?),
        StoreConfig::Lance { path } => Box::new(LanceStore::new(path).await?),
        StoreConfig::Memory => Box::new(MemoryStore::new()),
    };
    Ok(store)
}
