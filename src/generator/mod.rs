use crate::config::SourceConfig;
use crate::embedder::BertEmbedder;
use crate::record::{Deprecation, Record};
use anyhow::{bail, Result};
use rand::distributions::{Bernoulli, Distribution};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

mod file;
mod model;
mod random;

pub use file::{parse_vector, FileGenerator, VectorParseError};
pub use model::ModelGenerator;
pub use random::RandomGenerator;

/// A finite, ordered source of records. Calling `generate` again redraws everything.
pub trait RecordGenerator {
    fn name(&self) -> &'static str;

    fn generate(&mut self, vector_size: usize) -> Result<Vec<Record>>;
}

/// Weighted coin deciding whether a record starts out deprecated.
#[derive(Debug, Clone, Copy)]
pub struct DeprecationPolicy {
    coin: Bernoulli,
}

impl DeprecationPolicy {
    pub fn new(probability: f64) -> Result<Self> {
        let coin = Bernoulli::new(probability)
            .map_err(|e| anyhow::anyhow!("Invalid deprecated probability {}: {}", probability, e))?;
        Ok(Self { coin })
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Deprecation {
        Deprecation::from_flag(self.coin.sample(rng))
    }
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

pub(crate) fn ensure_width(records: &[Record], vector_size: usize) -> Result<()> {
    if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_size) {
        bail!(
            "record {} has {} dimensions, collection expects {}",
            bad.id,
            bad.vector.len(),
            vector_size
        );
    }
    Ok(())
}

/// Builds the generator named in the configuration. The model source loads its
/// weights here, once, before anything touches the store.
pub fn from_config(source: &SourceConfig) -> Result<Box<dyn RecordGenerator>> {
    let generator: Box<dyn RecordGenerator> = match source {
        SourceConfig::Random {
            count,
            deprecated_probability,
            categories,
            seed,
        } => Box::new(RandomGenerator::new(
            *count,
            categories.clone(),
            DeprecationPolicy::new(*deprecated_probability)?,
            *seed,
        )?),
        SourceConfig::Model {
            model_id,
            texts,
            categories,
            deprecated_probability,
            seed,
        } => {
            let embedder = BertEmbedder::load(model_id)?;
            Box::new(ModelGenerator::new(
                embedder,
                texts.clone(),
                categories.clone(),
                DeprecationPolicy::new(*deprecated_probability)?,
                *seed,
            )?)
        }
        SourceConfig::File { path } => Box::new(FileGenerator::new(path)),
    };
    info!(source = generator.name(), "Record generator ready");
    Ok(generator)
}
