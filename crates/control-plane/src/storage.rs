//! Artifact listing and dataset probes against object storage.
//!
//! All storage access goes through `object_store` handles; the S3-backed
//! stores are built in `main`, tests use the in-memory backend. Listing is
//! a single paginated read with no internal retry: transient storage errors
//! propagate to the caller, which owns retry policy.

use std::sync::Arc;

use futures::TryStreamExt;
use object_store::path::Path;
use object_store::ObjectStore;

use crate::error::AppResult;

/// Result of a directory lookup. An empty listing is an expected outcome,
/// not an error; the exit-ok/exit-error policy for it belongs to the
/// dispatcher, keyed on source family and run type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Keys with the requested prefix, sorted
    Found(Vec<Path>),
    /// No keys carry the prefix
    Empty,
}

/// List all keys starting with `prefix`.
///
/// Artifact prefixes end mid-filename, so the store is listed from the
/// containing directory and filtered by full string prefix. Keys come back
/// as the listed `Path` values: rebuilding a `Path` from their string form
/// would percent-encode any already-encoded segment a second time, and the
/// fetch would miss.
pub async fn list_keys(store: &Arc<dyn ObjectStore>, prefix: &str) -> AppResult<Listing> {
    let directory = prefix.rsplit_once('/').map(|(dir, _)| Path::from(dir));
    let mut keys: Vec<Path> = store
        .list(directory.as_ref())
        .map_ok(|meta| meta.location)
        .try_filter(|key| futures::future::ready(key.as_ref().starts_with(prefix)))
        .try_collect()
        .await?;

    if keys.is_empty() {
        tracing::debug!(prefix, "no files found for prefix");
        return Ok(Listing::Empty);
    }
    keys.sort();
    Ok(Listing::Found(keys))
}

/// Whether the transform step wrote any dataset records for this run.
///
/// The dataset is laid out hive-style under `dataset/data/`, partitioned by
/// run date and run id; a single key under the run's partition is proof of
/// records to load.
pub async fn dataset_records_exist(
    store: &Arc<dyn ObjectStore>,
    run_date: &str,
    run_id: &str,
) -> AppResult<bool> {
    let prefix = Path::from(format!("dataset/data/run_date={run_date}/run_id={run_id}"));
    let mut stream = store.list(Some(&prefix));
    Ok(stream.try_next().await?.is_some())
}
