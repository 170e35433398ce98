use anyhow::Result;
use std::io::Write;
use vecload::embedder::Embedder;
use vecload::generator::{DeprecationPolicy, FileGenerator, ModelGenerator, RecordGenerator};
use vecload::store::{CollectionConfig, Distance, MemoryStore};
use vecload::Pipeline;

const SENTENCES: [&str; 5] = [
    "The cat sat on the mat.",
    "Rust has no garbage collector.",
    "Qdrant stores points with payloads.",
    "Batches of one hundred points are uploaded.",
    "Deprecated answers keep their timestamp.",
];

fn embedding_cell(width: usize, seed: usize) -> String {
    let values: Vec<String> = (0..width)
        .map(|i| format!("{:.6}", ((i + seed) % 97) as f32 / 97.0))
        .collect();
    format!("[{}]", values.join(", "))
}

fn write_csv(rows: &[(String, &str, &str)]) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    // leading unnamed index column, as written by dataframe exports
    writeln!(file, ",embedding,deprecated,sentence")?;
    for (idx, (embedding, deprecated, sentence)) in rows.iter().enumerate() {
        writeln!(file, "{idx},\"{embedding}\",{deprecated},\"{sentence}\"")?;
    }
    file.flush()?;
    Ok(file)
}

#[tokio::test]
async fn file_source_loads_five_rows_without_category_or_value() -> Result<()> {
    let rows: Vec<(String, &str, &str)> = SENTENCES
        .iter()
        .enumerate()
        .map(|(i, s)| (embedding_cell(1536, i), if i % 2 == 0 { "True" } else { "False" }, *s))
        .collect();
    let file = write_csv(&rows)?;

    let store = MemoryStore::new();
    let collection = CollectionConfig::new("sentences", 1536, Distance::Cosine);
    let mut source = FileGenerator::new(file.path());

    let summary = Pipeline::new(&store, collection, 100).run(&mut source).await?;
    assert_eq!(summary.info.points_count, 5);
    assert_eq!(store.upsert_sizes(), vec![5]);

    let stored = store.records("sentences");
    assert_eq!(stored.len(), 5);
    for (idx, record) in stored.iter().enumerate() {
        assert_eq!(record.vector.len(), 1536);
        assert_eq!(record.payload.text(), SENTENCES[idx]);
        assert_eq!(record.payload.category(), None);
        assert_eq!(record.payload.value(), None);

        let deprecation = record.payload.deprecation();
        assert_eq!(deprecation.is_deprecated(), idx % 2 == 0);
        assert_eq!(deprecation.deprecated_at().is_some(), idx % 2 == 0);

        let json = record.payload.to_json()?;
        assert!(json.get("category").is_none());
        assert!(json.get("value").is_none());
    }
    Ok(())
}

#[tokio::test]
async fn malformed_embedding_fails_before_any_upload() -> Result<()> {
    let rows = vec![
        (embedding_cell(4, 0), "False", "fine"),
        ("eval('1+1')".to_string(), "False", "evil"),
    ];
    let file = write_csv(&rows)?;

    let store = MemoryStore::new();
    let collection = CollectionConfig::new("bad", 4, Distance::Cosine);
    let mut source = FileGenerator::new(file.path());

    let result = Pipeline::new(&store, collection, 100).run(&mut source).await;
    assert!(result.is_err());
    assert!(store.upsert_sizes().is_empty());
    Ok(())
}

#[test]
fn file_width_must_match_collection() -> Result<()> {
    let rows = vec![(embedding_cell(3, 0), "false", "short")];
    let file = write_csv(&rows)?;
    assert!(FileGenerator::new(file.path()).generate(4).is_err());
    Ok(())
}

#[test]
fn missing_file_fails_generation() {
    let mut source = FileGenerator::new("does/not/exist.csv");
    assert!(source.generate(4).is_err());
}

/// Deterministic stand-in for a 512-wide sentence model.
struct HashingEmbedder {
    calls: std::cell::Cell<usize>,
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        512
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.set(self.calls.get() + 1);
        Ok(texts
            .iter()
            .map(|t| {
                let seed = t.len() as f32;
                (0..512).map(|i| (seed + i as f32).sin()).collect()
            })
            .collect())
    }
}

#[tokio::test]
async fn model_source_embeds_five_texts_at_512() -> Result<()> {
    let texts: Vec<String> = SENTENCES.iter().map(|s| (*s).to_string()).collect();
    let embedder = HashingEmbedder {
        calls: std::cell::Cell::new(0),
    };
    let mut source = ModelGenerator::new(
        embedder,
        texts.clone(),
        vec!["technology".into(), "science".into()],
        DeprecationPolicy::new(0.2)?,
        Some(5),
    )?;

    let store = MemoryStore::new();
    let collection = CollectionConfig::new("embedded", 512, Distance::Cosine);
    let summary = Pipeline::new(&store, collection, 100).run(&mut source).await?;
    assert_eq!(summary.generated, 5);

    let stored = store.records("embedded");
    assert_eq!(stored.len(), 5);
    for (record, text) in stored.iter().zip(&texts) {
        assert_eq!(record.vector.len(), 512);
        assert_eq!(record.payload.text(), text.as_str());
        assert!(record.payload.category().is_some());
        assert!((1..100).contains(&record.payload.value().unwrap_or(0)));
    }
    Ok(())
}

#[test]
fn model_source_calls_embedder_once_per_generation() -> Result<()> {
    let texts: Vec<String> = SENTENCES.iter().map(|s| (*s).to_string()).collect();
    let mut source = ModelGenerator::new(
        HashingEmbedder {
            calls: std::cell::Cell::new(0),
        },
        texts,
        vec!["general".into()],
        DeprecationPolicy::new(0.0)?,
        None,
    )?;
    let records = source.generate(512)?;
    assert_eq!(records.len(), 5);
    assert_eq!(source.embedder().calls.get(), 1);
    assert!(records.iter().all(|r| !r.payload.deprecation().is_deprecated()));
    Ok(())
}
