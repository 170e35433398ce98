use super::{ensure_width, RecordGenerator};
use crate::record::{Deprecation, FileSourcedPayload, Payload, Record};
use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum VectorParseError {
    #[error("embedding column is empty")]
    Empty,
    #[error("embedding is not a numeric array: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("embedding has no components")]
    NoComponents,
    #[error("embedding component {index} does not fit in an f32")]
    NonFinite { index: usize },
}

/// Parses `[0.1, -2, 3e-4]` into floats. Anything that is not a flat array of
/// numbers is rejected.
pub fn parse_vector(text: &str) -> Result<Vec<f32>, VectorParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(VectorParseError::Empty);
    }
    let vector: Vec<f32> = serde_json::from_str(text)?;
    if vector.is_empty() {
        return Err(VectorParseError::NoComponents);
    }
    if let Some(index) = vector.iter().position(|x| !x.is_finite()) {
        return Err(VectorParseError::NonFinite { index });
    }
    Ok(vector)
}

#[derive(Debug, Deserialize)]
struct Row {
    embedding: String,
    #[serde(deserialize_with = "deserialize_flag")]
    deprecated: bool,
    sentence: String,
}

fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(de::Error::custom(format!("invalid boolean '{other}'"))),
    }
}

/// Reads precomputed embeddings from a CSV file with `embedding`, `deprecated`
/// and `sentence` columns. Other columns are ignored.
pub struct FileGenerator {
    path: PathBuf,
}

impl FileGenerator {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RecordGenerator for FileGenerator {
    fn name(&self) -> &'static str {
        "file"
    }

    fn generate(&mut self, vector_size: usize) -> Result<Vec<Record>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let mut records = Vec::new();
        for (id, row) in (0u64..).zip(reader.deserialize::<Row>()) {
            // header is line 1
            let line = id + 2;
            let row = row.with_context(|| format!("Malformed row at line {line}"))?;
            let vector = parse_vector(&row.embedding)
                .with_context(|| format!("Bad embedding at line {line}"))?;
            records.push(Record {
                id,
                vector,
                payload: Payload::FileSourced(FileSourcedPayload {
                    deprecation: Deprecation::from_flag(row.deprecated),
                    text: row.sentence,
                }),
            });
        }

        ensure_width(&records, vector_size)?;
        info!(path = %self.path.display(), count = records.len(), "Loaded embeddings file");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_arrays() {
        assert_eq!(parse_vector(" [0.5, -1, 2e-1] ").unwrap(), vec![0.5, -1.0, 0.2]);
    }

    #[test]
    fn rejects_anything_but_numbers() {
        assert!(matches!(parse_vector(""), Err(VectorParseError::Empty)));
        assert!(matches!(parse_vector("[]"), Err(VectorParseError::NoComponents)));
        assert!(matches!(
            parse_vector("__import__('os').system('ls')"),
            Err(VectorParseError::Malformed(_))
        ));
        assert!(matches!(parse_vector("[1, \"2\"]"), Err(VectorParseError::Malformed(_))));
        assert!(matches!(parse_vector("[[1, 2]]"), Err(VectorParseError::Malformed(_))));
        assert!(matches!(
            parse_vector("[1e39, 0.5]"),
            Err(VectorParseError::NonFinite { index: 0 })
        ));
        assert!(matches!(
            parse_vector("[0.5, -1e39]"),
            Err(VectorParseError::NonFinite { index: 1 })
        ));
    }
}
