use super::{CollectionConfig, CollectionInfo, Distance, VectorStore};
use crate::record::{Deprecation, Record};
use anyhow::{anyhow, bail, Context, Result};
use arrow_array::{
    ArrayRef, BooleanArray, FixedSizeListArray, Float32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray, UInt64Array,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use lancedb::connection::CreateTableMode;
use lancedb::{connect, Connection};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

const DISTANCE_KEY: &str = "distance";

/// LanceDB directory where every collection is a table.
pub struct LanceStore {
    connection: Connection,
}

impl LanceStore {
    pub async fn new(db_path: &str) -> Result<Self> {
        let connection = connect(db_path).execute().await?;
        info!(db_path, "Opened LanceDB");
        Ok(Self { connection })
    }

    fn schema(config: &CollectionConfig) -> Result<Schema> {
        let width = i32::try_from(config.vector_size)?;
        let metadata = HashMap::from([(
            DISTANCE_KEY.to_string(),
            config.distance.as_str().to_string(),
        )]);
        Ok(Schema::new_with_metadata(
            vec![
                Field::new("id", DataType::UInt64, false),
                Field::new(
                    "vector",
                    DataType::FixedSizeList(
                        Arc::new(Field::new("item", DataType::Float32, true)),
                        width,
                    ),
                    false,
                ),
                Field::new("deprecated", DataType::Boolean, false),
                Field::new("deprecated_at", DataType::Utf8, true),
                Field::new("text", DataType::Utf8, false),
                Field::new("category", DataType::Utf8, true),
                Field::new("value", DataType::Int64, true),
            ],
            metadata,
        ))
    }

    fn vector_width(schema: &Schema) -> Result<usize> {
        match schema.field_with_name("vector")?.data_type() {
            DataType::FixedSizeList(_, width) => Ok(usize::try_from(*width)?),
            other => Err(anyhow!("Unexpected vector column type {}", other)),
        }
    }

    fn stored_distance(schema: &Schema) -> Result<Distance> {
        let raw = schema
            .metadata()
            .get(DISTANCE_KEY)
            .ok_or_else(|| anyhow!("Table schema has no '{}' metadata", DISTANCE_KEY))?;
        Distance::parse(raw).ok_or_else(|| anyhow!("Unknown distance '{}' in table schema", raw))
    }

    fn id_filter(ids: &[u64]) -> String {
        let list: Vec<String> = ids.iter().map(u64::to_string).collect();
        format!("id IN ({})", list.join(", "))
    }

    fn to_batch(schema: SchemaRef, records: &[Record]) -> Result<RecordBatch> {
        let width = Self::vector_width(&schema)?;

        let ids = UInt64Array::from_iter_values(records.iter().map(|r| r.id));
        let mut values = Vec::with_capacity(records.len() * width);
        for record in records {
            if record.vector.len() != width {
                return Err(anyhow!(
                    "point {} has {} dimensions, table expects {}",
                    record.id,
                    record.vector.len(),
                    width
                ));
            }
            values.extend_from_slice(&record.vector);
        }
        let embedding_values = Arc::new(Float32Array::from(values)) as ArrayRef;
        let embedding_field = Field::new("item", DataType::Float32, true);
        let vectors = FixedSizeListArray::new(
            Arc::new(embedding_field),
            i32::try_from(width)?,
            embedding_values,
            None,
        );

        let deprecated = BooleanArray::from(
            records
                .iter()
                .map(|r| r.payload.deprecation().is_deprecated())
                .collect::<Vec<_>>(),
        );
        let deprecated_at = StringArray::from(
            records
                .iter()
                .map(|r| r.payload.deprecation().deprecated_at())
                .collect::<Vec<_>>(),
        );
        let text = StringArray::from(records.iter().map(|r| r.payload.text()).collect::<Vec<_>>());
        let category = StringArray::from(
            records
                .iter()
                .map(|r| r.payload.category())
                .collect::<Vec<_>>(),
        );
        let value = Int64Array::from(records.iter().map(|r| r.payload.value()).collect::<Vec<_>>());

        Ok(RecordBatch::try_new(
            schema,
            vec![
                Arc::new(ids),
                Arc::new(vectors),
                Arc::new(deprecated),
                Arc::new(deprecated_at),
                Arc::new(text),
                Arc::new(category),
                Arc::new(value),
            ],
        )?)
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn recreate_collection(&self, config: &CollectionConfig) -> Result<()> {
        let schema = Arc::new(Self::schema(config)?);
        let empty_batch = RecordBatch::new_empty(schema.clone());
        let batch_iterator = RecordBatchIterator::new(vec![Ok(empty_batch)], schema);
        self.connection
            .create_table(&config.name, Box::new(batch_iterator))
            .mode(CreateTableMode::Overwrite)
            .execute()
            .await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[Record]) -> Result<()> {
        let table = self.connection.open_table(collection).execute().await?;
        let schema = table.schema().await?;
        let batch = Self::to_batch(schema.clone(), records)?;
        let batch_iterator = RecordBatchIterator::new(vec![Ok(batch)], schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge.execute(Box::new(batch_iterator)).await?;
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionInfo> {
        let table = self.connection.open_table(name).execute().await?;
        let count = table.count_rows(None).await?;
        let schema = table.schema().await?;
        let distance = Self::stored_distance(&schema)
            .with_context(|| format!("Collection '{name}' has unusable vector parameters"))?;

        Ok(CollectionInfo {
            points_count: count as u64,
            vector_size: Self::vector_width(&schema)?,
            distance,
        })
    }

    async fn mark_deprecated(&self, collection: &str, ids: &[u64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let table = self.connection.open_table(collection).execute().await?;
        let filter = Self::id_filter(ids);
        let wanted = ids.iter().collect::<std::collections::BTreeSet<_>>().len();
        let found = table.count_rows(Some(filter.clone())).await?;
        if found != wanted {
            bail!(
                "Only {} of {} points exist in '{}'",
                found,
                wanted,
                collection
            );
        }

        let deprecation = Deprecation::flagged_now();
        let at = deprecation.deprecated_at().unwrap_or_default();
        table
            .update()
            .only_if(filter)
            .column("deprecated", "true")
            .column("deprecated_at", format!("'{at}'"))
            .execute()
            .await?;
        info!(collection, count = ids.len(), "Marked points deprecated");
        Ok(())
    }
}
