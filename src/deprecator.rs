use crate::store::VectorStore;
use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use tracing::{info, info_span, Instrument};

/// Flags already loaded points as deprecated. Duplicate ids count once.
///
/// Every id must exist in the collection; the store sets `deprecated` and
/// `deprecated_at` together and leaves vectors and other payload fields alone.
pub async fn deprecate<S: VectorStore + ?Sized>(
    store: &S,
    collection: &str,
    ids: &[u64],
) -> Result<Vec<u64>> {
    let unique: Vec<u64> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    if unique.is_empty() {
        bail!("no point ids given to deprecate");
    }

    store
        .mark_deprecated(collection, &unique)
        .instrument(info_span!("mark_deprecated", collection, count = unique.len()))
        .await
        .with_context(|| format!("Failed to deprecate points in '{collection}'"))?;
    info!(?unique, "Deprecated points in {}", collection);
    Ok(unique)
}

/// Parses point ids given on the command line.
pub fn parse_ids<I, T>(raw: I) -> Result<Vec<u64>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    raw.into_iter()
        .map(|id| {
            let id = id.as_ref();
            id.trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid point id '{id}'"))
        })
        .collect()
}
