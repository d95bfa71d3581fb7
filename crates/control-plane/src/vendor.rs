//! Vendor export normalization.
//!
//! Some sources' upstream exports arrive in a separate vendor bucket as
//! gzipped tar archives with vendor-chosen names
//! (`EXPORT_<RUNTYPE>_<TIMESTAMP>[<job>]_<loadtype>[_<seq>].tar.gz`).
//! Before the transform step can discover extract output, each archive's
//! payload member is pulled out, renamed to the pipeline's artifact key
//! convention, and uploaded into the pipeline bucket. The decode path
//! streams in fixed-size chunks so archive size never dictates memory use.

use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use flate2::read::GzDecoder;
use futures::TryStreamExt;
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::ObjectStore;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::engine::naming::{self, LoadType};
use crate::error::{AppError, AppResult};
use crate::payload::{RunContext, Step};
use crate::storage::{self, Listing};

/// Upload chunk size; bounds memory for arbitrarily large exports.
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Normalize this run's vendor export archives into pipeline-named extract
/// files. Returns the number of archives processed; zero when the vendor
/// produced nothing for the run's date and run type.
pub async fn normalize_exports(
    run: &RunContext,
    config: &AppConfig,
    vendor_store: &Arc<dyn ObjectStore>,
    pipeline_store: &Arc<dyn ObjectStore>,
) -> AppResult<usize> {
    let job_date = run.run_date.format("%Y%m%d");
    let archive_prefix = format!(
        "{}/EXPORT_{}_{}",
        config.vendor_export_prefix,
        run.run_type.as_str().to_uppercase(),
        job_date,
    );

    let archives = match storage::list_keys(vendor_store, &archive_prefix).await? {
        Listing::Found(keys) => keys,
        Listing::Empty => {
            info!(
                source = %run.source,
                prefix = %archive_prefix,
                "no vendor export archives found for run"
            );
            return Ok(0);
        }
    };
    info!(
        count = archives.len(),
        source = %run.source,
        run_date = %run.run_date_string(),
        "vendor export archives found"
    );

    let extract_prefix =
        naming::output_prefix(&run.source, run.run_date, run.run_type, Step::Extract);
    for archive in &archives {
        let (load_type, sequence) = parse_export_filename(archive.as_ref())?;
        let target_key = naming::output_filename(
            &extract_prefix,
            load_type,
            Step::Extract,
            run.family,
            sequence.as_deref(),
        );
        copy_archive_payload(vendor_store, archive, pipeline_store, &target_key).await?;
        debug!(
            archive = %archive,
            target = %target_key,
            "vendor export archive normalized"
        );
    }

    Ok(archives.len())
}

/// Classify a vendor export filename into a load type and an optional
/// zero-padded two-digit sequence. Vendor load-type tokens `new` and
/// `update` both mean records to index; `delete` means tombstones.
pub fn parse_export_filename(export_key: &str) -> AppResult<(LoadType, Option<String>)> {
    let stem = export_key.split('.').next().unwrap_or_default();
    let parts: Vec<&str> = stem.split('_').collect();

    let (raw_load_type, sequence) = match parts.last() {
        Some(last) if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) => {
            let load_type = parts
                .get(parts.len().saturating_sub(2))
                .copied()
                .unwrap_or_default();
            (load_type, Some(format!("{last:0>2}")))
        }
        Some(last) => (*last, None),
        None => ("", None),
    };

    let load_type = match raw_load_type {
        "new" | "update" => LoadType::Index,
        "delete" => LoadType::Delete,
        other => {
            return Err(AppError::Archive(format!(
                "unrecognized load type '{other}' in vendor export filename '{export_key}'"
            )))
        }
    };
    Ok((load_type, sequence))
}

/// Stream the single payload member of a gzipped tar archive from the
/// vendor bucket into the pipeline bucket under `target_key`.
///
/// `archive` is the path exactly as listed; vendor export names carry
/// bracket segments that a string round trip would re-encode. The archive
/// is decoded on a blocking thread and handed to the uploader in bounded
/// chunks over a channel.
async fn copy_archive_payload(
    vendor_store: &Arc<dyn ObjectStore>,
    archive: &Path,
    pipeline_store: &Arc<dyn ObjectStore>,
    target_key: &str,
) -> AppResult<()> {
    let archive_stream = vendor_store
        .get(archive)
        .await?
        .into_stream()
        .map_err(std::io::Error::other);
    let archive_reader = StreamReader::new(archive_stream);

    let (chunk_tx, mut chunk_rx) = mpsc::channel::<Bytes>(4);
    let unpack = tokio::task::spawn_blocking(move || -> AppResult<()> {
        let mut archive = tar::Archive::new(GzDecoder::new(SyncIoBridge::new(archive_reader)));
        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let mut buffer = vec![0u8; CHUNK_SIZE];
            loop {
                let read = entry.read(&mut buffer)?;
                if read == 0 {
                    break;
                }
                if chunk_tx
                    .blocking_send(Bytes::copy_from_slice(&buffer[..read]))
                    .is_err()
                {
                    // Receiver is gone; the upload side already failed.
                    return Ok(());
                }
            }
            // Export archives carry a single payload member.
            return Ok(());
        }
        Err(AppError::Archive(
            "vendor export archive contains no payload member".to_string(),
        ))
    });

    let mut writer = BufWriter::new(Arc::clone(pipeline_store), Path::from(target_key));
    while let Some(chunk) = chunk_rx.recv().await {
        writer.write_all(&chunk).await?;
    }
    unpack
        .await
        .map_err(|e| AppError::Internal(format!("archive unpack task failed: {e}")))??;
    writer.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceTables;
    use crate::payload::{parse, InputPayload};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use object_store::memory::InMemory;
    use object_store::PutPayload;

    fn targz_fixture(member_name: &str, contents: &[u8]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, member_name, contents).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    async fn vendor_store_with_archives(archives: &[(&str, &[u8])]) -> Arc<dyn ObjectStore> {
        let store = InMemory::new();
        for (key, contents) in archives {
            let archive = targz_fixture("records.xml", contents);
            store
                .put(&Path::from(*key), PutPayload::from(archive))
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    fn alma_transform_run(run_date: &str) -> RunContext {
        parse(
            &InputPayload {
                next_step: Some("transform".to_string()),
                run_date: Some(run_date.to_string()),
                run_type: Some("daily".to_string()),
                source: Some("alma".to_string()),
                run_id: Some("run-abc-123".to_string()),
                ..Default::default()
            },
            &SourceTables::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_export_filename_with_sequence() {
        let (load_type, sequence) =
            parse_export_filename("exports/EXPORT_DAILY_20220912_210929[053]_new_1.tar.gz")
                .unwrap();
        assert_eq!(load_type, LoadType::Index);
        assert_eq!(sequence.as_deref(), Some("01"));
    }

    #[test]
    fn test_parse_export_filename_without_sequence() {
        let (load_type, sequence) =
            parse_export_filename("exports/EXPORT_DAILY_20220912_210929[053]_delete.tar.gz")
                .unwrap();
        assert_eq!(load_type, LoadType::Delete);
        assert_eq!(sequence, None);
    }

    #[test]
    fn test_parse_export_filename_update_maps_to_index() {
        let (load_type, sequence) =
            parse_export_filename("exports/EXPORT_FULL_20220912_210929[053]_update_12.tar.gz")
                .unwrap();
        assert_eq!(load_type, LoadType::Index);
        assert_eq!(sequence.as_deref(), Some("12"));
    }

    #[test]
    fn test_parse_export_filename_with_encoded_job_segment() {
        // Listed paths render bracket segments percent-encoded; the
        // load-type and sequence tokens are unaffected.
        let (load_type, sequence) =
            parse_export_filename("exports/EXPORT_DAILY_20220912_210929%5B053%5D_new_1.tar.gz")
                .unwrap();
        assert_eq!(load_type, LoadType::Index);
        assert_eq!(sequence.as_deref(), Some("01"));
    }

    #[test]
    fn test_parse_export_filename_unrecognized_load_type() {
        let err =
            parse_export_filename("exports/EXPORT_DAILY_20220912_210929[053]_weird.tar.gz")
                .unwrap_err();
        assert!(err.to_string().contains("unrecognized load type 'weird'"));
    }

    #[tokio::test]
    async fn test_normalize_exports_renames_and_uploads() {
        let xml = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><records/>";
        let vendor_store = vendor_store_with_archives(&[
            (
                "exports/EXPORT_DAILY_20220912_210929[053]_delete.tar.gz",
                xml.as_slice(),
            ),
            (
                "exports/EXPORT_DAILY_20220912_210929[053]_new_1.tar.gz",
                xml.as_slice(),
            ),
            (
                "exports/EXPORT_DAILY_20220912_210929[053]_new_2.tar.gz",
                xml.as_slice(),
            ),
        ])
        .await;
        let pipeline_store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());

        let run = alma_transform_run("2022-09-12");
        let count = normalize_exports(
            &run,
            &AppConfig::for_tests(),
            &vendor_store,
            &pipeline_store,
        )
        .await
        .unwrap();
        assert_eq!(count, 3);

        let uploaded = pipeline_store
            .get(&Path::from(
                "alma/alma-2022-09-12-daily-extracted-records-to-index_01.xml",
            ))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(uploaded.as_ref(), xml.as_slice());

        for key in [
            "alma/alma-2022-09-12-daily-extracted-records-to-delete.xml",
            "alma/alma-2022-09-12-daily-extracted-records-to-index_02.xml",
        ] {
            pipeline_store.get(&Path::from(key)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_normalize_exports_no_archives_returns_zero() {
        let vendor_store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let pipeline_store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let run = alma_transform_run("2022-09-12");
        let count = normalize_exports(
            &run,
            &AppConfig::for_tests(),
            &vendor_store,
            &pipeline_store,
        )
        .await
        .unwrap();
        assert_eq!(count, 0);
    }
}
