use super::{ensure_width, seeded_rng, DeprecationPolicy, RecordGenerator};
use crate::embedder::Embedder;
use crate::record::{Payload, Record, TextPayload};
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

/// Embeds a fixed list of texts with a model that is already loaded.
pub struct ModelGenerator<E: Embedder> {
    embedder: E,
    texts: Vec<String>,
    categories: Vec<String>,
    policy: DeprecationPolicy,
    rng: StdRng,
}

impl<E: Embedder> ModelGenerator<E> {
    pub fn new(
        embedder: E,
        texts: Vec<String>,
        categories: Vec<String>,
        policy: DeprecationPolicy,
        seed: Option<u64>,
    ) -> Result<Self> {
        if categories.is_empty() {
            bail!("model source needs at least one category");
        }
        Ok(Self {
            embedder,
            texts,
            categories,
            policy,
            rng: seeded_rng(seed),
        })
    }

    pub const fn embedder(&self) -> &E {
        &self.embedder
    }
}

impl<E: Embedder> RecordGenerator for ModelGenerator<E> {
    fn name(&self) -> &'static str {
        "model"
    }

    fn generate(&mut self, vector_size: usize) -> Result<Vec<Record>> {
        if self.embedder.dimension() != vector_size {
            bail!(
                "model produces {}-dimensional vectors, collection expects {}",
                self.embedder.dimension(),
                vector_size
            );
        }

        let vectors = self.embedder.embed(&self.texts)?;
        if vectors.len() != self.texts.len() {
            bail!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                self.texts.len()
            );
        }

        let records: Vec<Record> = self
            .texts
            .iter()
            .zip(vectors)
            .zip(0u64..)
            .map(|((text, vector), id)| {
                let deprecation = self.policy.draw(&mut self.rng);
                let category = self
                    .categories
                    .choose(&mut self.rng)
                    .cloned()
                    .unwrap_or_default();
                Record {
                    id,
                    vector,
                    payload: Payload::Text(TextPayload {
                        deprecation,
                        text: text.clone(),
                        category,
                        value: self.rng.gen_range(1..100),
                    }),
                }
            })
            .collect();

        ensure_width(&records, vector_size)?;
        info!(count = records.len(), "Embedded texts");
        Ok(records)
    }
}
