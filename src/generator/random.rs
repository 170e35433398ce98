use super::{seeded_rng, DeprecationPolicy, RecordGenerator};
use crate::record::{Payload, Record, SyntheticPayload};
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Uniform [0, 1) vectors with synthetic metadata.
pub struct RandomGenerator {
    count: usize,
    categories: Vec<String>,
    policy: DeprecationPolicy,
    rng: StdRng,
}

impl RandomGenerator {
    pub fn new(
        count: usize,
        categories: Vec<String>,
        policy: DeprecationPolicy,
        seed: Option<u64>,
    ) -> Result<Self> {
        if categories.is_empty() {
            bail!("random source needs at least one category");
        }
        Ok(Self {
            count,
            categories,
            policy,
            rng: seeded_rng(seed),
        })
    }
}

impl RecordGenerator for RandomGenerator {
    fn name(&self) -> &'static str {
        "random"
    }

    fn generate(&mut self, vector_size: usize) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(self.count);
        for id in 0..self.count as u64 {
            let vector: Vec<f32> = (0..vector_size).map(|_| self.rng.gen::<f32>()).collect();
            let deprecation = self.policy.draw(&mut self.rng);
            let category = self
                .categories
                .choose(&mut self.rng)
                .cloned()
                .unwrap_or_default();

            records.push(Record {
                id,
                vector,
                payload: Payload::Synthetic(SyntheticPayload {
                    deprecation,
                    text: format!("Sample text {id}"),
                    category,
                    value: self.rng.gen_range(1..100),
                }),
            });
        }
        debug!(count = records.len(), "Generated random records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(count: usize, seed: u64) -> RandomGenerator {
        RandomGenerator::new(
            count,
            vec!["A".into(), "B".into(), "C".into()],
            DeprecationPolicy::new(0.2).unwrap(),
            Some(seed),
        )
        .unwrap()
    }

    #[test]
    fn records_match_width_and_ranges() {
        let records = generator(300, 1).generate(16).unwrap();
        assert_eq!(records.len(), 300);
        for (idx, record) in records.iter().enumerate() {
            assert_eq!(record.id, idx as u64);
            assert_eq!(record.vector.len(), 16);
            assert!(record.vector.iter().all(|x| (0.0..1.0).contains(x)));
            assert_eq!(record.payload.text(), format!("Sample text {idx}"));
            assert!(["A", "B", "C"].contains(&record.payload.category().unwrap()));
            assert!((1..100).contains(&record.payload.value().unwrap()));
        }
    }

    #[test]
    fn same_seed_same_records() {
        let a = generator(20, 42).generate(4).unwrap();
        let b = generator(20, 42).generate(4).unwrap();
        let vectors = |r: &[Record]| r.iter().map(|x| x.vector.clone()).collect::<Vec<_>>();
        assert_eq!(vectors(&a), vectors(&b));
    }

    #[test]
    fn empty_categories_rejected() {
        assert!(RandomGenerator::new(1, Vec::new(), DeprecationPolicy::new(0.2).unwrap(), None).is_err());
    }
}
