use crate::store::CollectionConfig;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_DEPRECATED_PROBABILITY: f64 = 0.2;
pub const DEFAULT_MODEL_ID: &str = "google/bert_uncased_L-4_H-512_A-8";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub collection: CollectionConfig,
    pub store: StoreConfig,
    pub batch_size: usize,
    pub source: SourceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collection: CollectionConfig::default(),
            store: StoreConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            source: SourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Qdrant {
        #[serde(default = "default_host")]
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Lance {
        #[serde(default = "default_lance_path")]
        path: String,
    },
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Qdrant {
            host: default_host(),
            port: default_port(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Random {
        #[serde(default = "default_count")]
        count: usize,
        #[serde(default = "default_probability")]
        deprecated_probability: f64,
        #[serde(default = "default_random_categories")]
        categories: Vec<String>,
        #[serde(default)]
        seed: Option<u64>,
    },
    Model {
        #[serde(default = "default_model_id")]
        model_id: String,
        #[serde(default = "default_texts")]
        texts: Vec<String>,
        #[serde(default = "default_model_categories")]
        categories: Vec<String>,
        #[serde(default = "default_probability")]
        deprecated_probability: f64,
        #[serde(default)]
        seed: Option<u64>,
    },
    File {
        path: PathBuf,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Random {
            count: default_count(),
            deprecated_probability: default_probability(),
            categories: default_random_categories(),
            seed: None,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    6334
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_lance_path() -> String {
    "data/vecload".to_string()
}

const fn default_count() -> usize {
    1000
}

const fn default_probability() -> f64 {
    DEFAULT_DEPRECATED_PROBABILITY
}

fn default_random_categories() -> Vec<String> {
    ["A", "B", "C"].iter().map(|c| (*c).to_string()).collect()
}

fn default_model_categories() -> Vec<String> {
    ["technology", "science", "general"]
        .iter()
        .map(|c| (*c).to_string())
        .collect()
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_texts() -> Vec<String> {
    [
        "Vector databases store embeddings for similarity search.",
        "Deprecated answers are flagged instead of being deleted.",
        "Batch uploads keep the number of network round trips low.",
        "Cosine distance compares the direction of two vectors.",
        "Every point carries a payload with searchable metadata.",
    ]
    .iter()
    .map(|t| (*t).to_string())
    .collect()
}

impl Config {
    pub fn load_from_yaml(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // an empty document deserializes to unit, not to an empty map
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.collection.name.is_empty() {
            bail!("collection name must not be empty");
        }
        if self.collection.vector_size == 0 {
            bail!("collection vector_size must be positive");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        match &self.source {
            SourceConfig::Random {
                deprecated_probability,
                categories,
                ..
            }
            | SourceConfig::Model {
                deprecated_probability,
                categories,
                ..
            } => {
                if !(0.0..=1.0).contains(deprecated_probability) {
                    bail!(
                        "deprecated_probability must be within [0, 1], got {}",
                        deprecated_probability
                    );
                }
                if categories.is_empty() {
                    bail!("categories must not be empty");
                }
            }
            SourceConfig::File { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_random_defaults() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.collection.name, "test_collection");
        assert_eq!(config.collection.vector_size, 128);
        assert_eq!(config.batch_size, 100);
        assert!(matches!(
            config.source,
            SourceConfig::Random { count: 1000, .. }
        ));
        assert!(matches!(config.store, StoreConfig::Qdrant { port: 6334, .. }));
    }

    #[test]
    fn parses_file_source_with_lance_store() {
        let yaml = r"
collection:
  name: sentences
  vector_size: 1536
  distance: cosine
store:
  backend: lance
  path: /tmp/lance
source:
  kind: file
  path: data/embeddings.csv
";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.collection.vector_size, 1536);
        assert!(matches!(config.store, StoreConfig::Lance { ref path } if path == "/tmp/lance"));
        assert!(matches!(config.source, SourceConfig::File { .. }));
    }

    #[test]
    fn rejects_zero_width_and_zero_batch() {
        assert!(Config::from_yaml_str("collection: { name: c, vector_size: 0, distance: cosine }").is_err());
        assert!(Config::from_yaml_str("batch_size: 0").is_err());
    }

    #[test]
    fn partial_collection_block_keeps_defaults() {
        let config = Config::from_yaml_str("collection: { name: mine }").unwrap();
        assert_eq!(config.collection.name, "mine");
        assert_eq!(config.collection.vector_size, 128);
        assert_eq!(config.collection.distance, crate::store::Distance::Cosine);

        let config = Config::from_yaml_str("collection: { vector_size: 512 }").unwrap();
        assert_eq!(config.collection.name, "test_collection");
        assert_eq!(config.collection.vector_size, 512);
    }

    #[test]
    fn rejects_probability_out_of_range() {
        let yaml = "source: { kind: random, deprecated_probability: 1.5 }";
        assert!(Config::from_yaml_str(yaml).is_err());
    }
}
