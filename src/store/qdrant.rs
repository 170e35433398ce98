use super::{CollectionConfig, CollectionInfo, Distance, VectorStore};
use crate::record::{Deprecation, Record};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    self, CreateCollectionBuilder, PointStruct, PointsIdsList, SetPayloadPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::time::Duration;
use tracing::{debug, info};

/// Qdrant over gRPC.
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    pub fn new(url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(api_key) = api_key {
            builder = builder.api_key(api_key);
        }
        builder = builder.timeout(Duration::from_secs(timeout_secs));

        let client = builder
            .build()
            .with_context(|| format!("Failed to build Qdrant client for {url}"))?;
        info!(url, "Connected Qdrant client");
        Ok(Self { client })
    }

    const fn to_qdrant_distance(distance: Distance) -> qdrant::Distance {
        match distance {
            Distance::Cosine => qdrant::Distance::Cosine,
            Distance::Euclid => qdrant::Distance::Euclid,
            Distance::Dot => qdrant::Distance::Dot,
            Distance::Manhattan => qdrant::Distance::Manhattan,
        }
    }

    const fn from_qdrant_distance(distance: qdrant::Distance) -> Option<Distance> {
        match distance {
            qdrant::Distance::Cosine => Some(Distance::Cosine),
            qdrant::Distance::Euclid => Some(Distance::Euclid),
            qdrant::Distance::Dot => Some(Distance::Dot),
            qdrant::Distance::Manhattan => Some(Distance::Manhattan),
            qdrant::Distance::UnknownDistance => None,
        }
    }

    fn to_point(record: &Record) -> Result<PointStruct> {
        let json = record
            .payload
            .to_json()
            .with_context(|| format!("Failed to serialize payload for point {}", record.id))?;
        let payload = Payload::try_from(json)
            .map_err(|e| anyhow!("Invalid payload for point {}: {}", record.id, e))?;
        Ok(PointStruct::new(record.id, record.vector.clone(), payload))
    }

    fn deprecation_payload(deprecation: &Deprecation) -> Result<Payload> {
        let json = serde_json::to_value(deprecation)?;
        Payload::try_from(json).map_err(|e| anyhow!("Invalid deprecation payload: {}", e))
    }

    fn vector_params(info: &qdrant::CollectionInfo) -> Result<(usize, Distance)> {
        let vectors = info
            .config
            .as_ref()
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|v| v.config.as_ref())
            .ok_or_else(|| anyhow!("no vector parameters"))?;
        let params = match vectors {
            qdrant::vectors_config::Config::Params(p) => p,
            // named vectors: report the first one
            qdrant::vectors_config::Config::ParamsMap(map) => map
                .map
                .values()
                .next()
                .ok_or_else(|| anyhow!("no named vectors"))?,
        };
        let size = usize::try_from(params.size)?;
        let distance = Self::from_qdrant_distance(params.distance())
            .ok_or_else(|| anyhow!("unknown distance {}", params.distance))?;
        Ok((size, distance))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn recreate_collection(&self, config: &CollectionConfig) -> Result<()> {
        if self.client.collection_exists(config.name.as_str()).await? {
            debug!(collection = %config.name, "Deleting existing collection");
            self.client.delete_collection(config.name.as_str()).await?;
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(config.name.as_str()).vectors_config(
                    VectorParamsBuilder::new(
                        config.vector_size as u64,
                        Self::to_qdrant_distance(config.distance),
                    ),
                ),
            )
            .await
            .with_context(|| format!("Failed to create collection '{}'", config.name))?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[Record]) -> Result<()> {
        let points = records
            .iter()
            .map(Self::to_point)
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .with_context(|| format!("Failed to upsert into '{collection}'"))?;
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionInfo> {
        let response = self
            .client
            .collection_info(name)
            .await
            .with_context(|| format!("Failed to read collection '{name}'"))?;
        let info = response
            .result
            .ok_or_else(|| anyhow!("Collection info missing result for '{}'", name))?;

        let (vector_size, distance) = Self::vector_params(&info)
            .with_context(|| format!("Collection '{name}' has unusable vector parameters"))?;

        Ok(CollectionInfo {
            points_count: info.points_count.unwrap_or(0),
            vector_size,
            distance,
        })
    }

    async fn mark_deprecated(&self, collection: &str, ids: &[u64]) -> Result<()> {
        let payload = Self::deprecation_payload(&Deprecation::flagged_now())?;
        let selector = PointsIdsList {
            ids: ids.iter().map(|&id| id.into()).collect(),
        };

        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(collection, payload)
                    .points_selector(selector)
                    .wait(true),
            )
            .await
            .with_context(|| format!("Failed to mark points deprecated in '{collection}'"))?;
        info!(collection, count = ids.len(), "Marked points deprecated");
        Ok(())
    }
}
