use crate::store::{CollectionInfo, VectorStore};
use anyhow::Result;
use tracing::{info, warn};

/// Reads back collection metadata after an upload. A count that differs from
/// `expected_points` is reported, never treated as an error.
pub async fn verify<S: VectorStore + ?Sized>(
    store: &S,
    collection: &str,
    expected_points: usize,
) -> Result<CollectionInfo> {
    let info = store.get_collection(collection).await?;

    info!(
        collection,
        points_count = info.points_count,
        vector_size = info.vector_size,
        distance = info.distance.as_str(),
        "Collection info"
    );
    if info.points_count != expected_points as u64 {
        warn!(
            expected = expected_points,
            found = info.points_count,
            "Point count differs from uploaded records"
        );
    }
    Ok(info)
}
