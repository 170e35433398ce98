pub mod config;
pub mod deprecator;
pub mod embedder;
pub mod generator;
pub mod record;
pub mod store;
pub mod uploader;
pub mod verifier;

use crate::generator::RecordGenerator;
use crate::store::{CollectionConfig, CollectionInfo, VectorStore};
use crate::uploader::{BatchProgress, BatchUploader};
use anyhow::{Context, Result};
use std::fmt;
use tracing::{info, info_span, Instrument};

pub use crate::config::Config;
pub use crate::record::{Payload, Record};

/// Steps of a load run, in the only order they happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    CollectionCreated,
    RecordsGenerated,
    Uploaded,
    Verified,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::CollectionCreated => "collection_created",
            Self::RecordsGenerated => "records_generated",
            Self::Uploaded => "uploaded",
            Self::Verified => "verified",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub collection: CollectionConfig,
    pub generated: usize,
    pub batches: Vec<BatchProgress>,
    pub info: CollectionInfo,
}

/// Recreates a collection, fills it from a generator and reads it back.
pub struct Pipeline<'a, S: VectorStore + ?Sized> {
    store: &'a S,
    collection: CollectionConfig,
    batch_size: usize,
}

impl<'a, S: VectorStore + ?Sized> Pipeline<'a, S> {
    pub const fn new(store: &'a S, collection: CollectionConfig, batch_size: usize) -> Self {
        Self {
            store,
            collection,
            batch_size,
        }
    }

    pub async fn run(&self, generator: &mut dyn RecordGenerator) -> Result<LoadSummary> {
        let name = self.collection.name.as_str();
        let uploader = BatchUploader::new(self.store, self.batch_size)?;
        let mut stage = Stage::Start;

        self.store
            .recreate_collection(&self.collection)
            .instrument(info_span!("recreate_collection", collection = name))
            .await
            .with_context(|| format!("Failed to recreate collection '{name}'"))?;
        stage = advance(stage, Stage::CollectionCreated);
        info!(
            vector_size = self.collection.vector_size,
            distance = self.collection.distance.as_str(),
            "Created collection: {}",
            name
        );

        let records = {
            let _span = info_span!("generate", source = generator.name()).entered();
            generator
                .generate(self.collection.vector_size)
                .with_context(|| format!("Failed to generate {} records", generator.name()))?
        };
        stage = advance(stage, Stage::RecordsGenerated);

        let batches = uploader.upload(name, &records).await?;
        stage = advance(stage, Stage::Uploaded);

        let info = verifier::verify(self.store, name, records.len()).await?;
        advance(stage, Stage::Verified);

        Ok(LoadSummary {
            collection: self.collection.clone(),
            generated: records.len(),
            batches,
            info,
        })
    }
}

fn advance(from: Stage, to: Stage) -> Stage {
    info!(from = %from, to = %to, "Stage complete");
    to
}
