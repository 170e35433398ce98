use super::{CollectionConfig, CollectionInfo, VectorStore};
use crate::record::{Deprecation, Record};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::debug;

struct MemoryCollection {
    config: CollectionConfig,
    points: BTreeMap<u64, Record>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, MemoryCollection>,
    upsert_sizes: Vec<usize>,
    fail_upsert_at: Option<usize>,
}

/// In-process store for dry runs. Nothing leaves the process.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the upsert call with this zero-based index fail.
    pub fn fail_upsert_at(&self, call: usize) {
        self.lock().fail_upsert_at = Some(call);
    }

    /// Sizes of every upsert call received, including a failed one.
    pub fn upsert_sizes(&self) -> Vec<usize> {
        self.lock().upsert_sizes.clone()
    }

    /// Stored records of a collection ordered by id.
    pub fn records(&self, name: &str) -> Vec<Record> {
        self.lock()
            .collections
            .get(name)
            .map(|c| c.points.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn recreate_collection(&self, config: &CollectionConfig) -> Result<()> {
        if config.vector_size == 0 {
            bail!("vector size must be positive for collection '{}'", config.name);
        }
        let mut state = self.lock();
        let replaced = state
            .collections
            .insert(
                config.name.clone(),
                MemoryCollection {
                    config: config.clone(),
                    points: BTreeMap::new(),
                },
            )
            .is_some();
        debug!(collection = %config.name, replaced, "Recreated in-memory collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[Record]) -> Result<()> {
        let mut state = self.lock();
        let call = state.upsert_sizes.len();
        state.upsert_sizes.push(records.len());
        if state.fail_upsert_at == Some(call) {
            bail!("injected failure on upsert call {}", call);
        }

        let target = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| anyhow!("Collection not found: {}", collection))?;
        for record in records {
            if record.vector.len() != target.config.vector_size {
                bail!(
                    "point {} has {} dimensions, collection '{}' expects {}",
                    record.id,
                    record.vector.len(),
                    collection,
                    target.config.vector_size
                );
            }
        }
        for record in records {
            target.points.insert(record.id, record.clone());
        }
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionInfo> {
        let state = self.lock();
        let collection = state
            .collections
            .get(name)
            .ok_or_else(|| anyhow!("Collection not found: {}", name))?;
        Ok(CollectionInfo {
            points_count: collection.points.len() as u64,
            vector_size: collection.config.vector_size,
            distance: collection.config.distance,
        })
    }

    async fn mark_deprecated(&self, collection: &str, ids: &[u64]) -> Result<()> {
        let mut state = self.lock();
        let target = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| anyhow!("Collection not found: {}", collection))?;
        if let Some(missing) = ids.iter().find(|id| !target.points.contains_key(*id)) {
            bail!("point {} not found in '{}'", missing, collection);
        }

        let deprecation = Deprecation::flagged_now();
        for id in ids {
            if let Some(record) = target.points.get_mut(id) {
                record.payload.set_deprecation(deprecation.clone());
            }
        }
        debug!(collection, count = ids.len(), "Marked in-memory points deprecated");
        Ok(())
    }
}
