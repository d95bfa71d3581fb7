//! Step dispatcher.
//!
//! State machine over validated runs: `extract -> transform -> load -> end`,
//! with terminal side exits. An exit-ok outcome (`success` message) means
//! there is legitimately nothing to do; an exit-error outcome (`failure`
//! message) means expected artifacts are missing or the input asked for
//! something the load step cannot do. Either way the dispatcher returns a
//! payload rather than an error; `Err` is reserved for storage and archive
//! faults.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use object_store::ObjectStore;
use tracing::{info, warn};

use crate::config::{AppConfig, SourceTables};
use crate::engine::{commands, naming};
use crate::engine::commands::LoadCommands;
use crate::error::AppResult;
use crate::payload::{OutputPayload, RunContext, RunType, Step};
use crate::storage::{self, Listing};
use crate::vendor;

const NO_EXTRACTED_FILES_MESSAGE: &str = "There were no extracted files present in the \
    pipeline bucket for the provided date and source, something likely went wrong.";
const NO_DAILY_RECORDS_MESSAGE: &str =
    "There were no daily new/updated/deleted records to harvest.";
const NO_DATASET_RECORDS_MESSAGE: &str =
    "There were no transformed records in the dataset for the provided run, nothing to load.";

/// Run the step named by the payload's `next-step` and produce the output
/// payload for the workflow engine.
///
/// `now` feeds full-run index names and is injected for reproducibility.
pub async fn dispatch(
    run: &RunContext,
    config: &AppConfig,
    tables: &SourceTables,
    pipeline_store: &Arc<dyn ObjectStore>,
    vendor_store: &Arc<dyn ObjectStore>,
    now: DateTime<Utc>,
) -> AppResult<OutputPayload> {
    info!(
        step = %run.next_step,
        source = %run.source,
        run_date = %run.run_date_string(),
        run_type = %run.run_type,
        run_id = %run.run_id,
        "dispatching step"
    );
    match run.next_step {
        Step::Extract => extract_step(run, config),
        Step::Transform => {
            transform_step(run, config, tables, pipeline_store, vendor_store).await
        }
        Step::Load => load_step(run, config, tables, pipeline_store, now).await,
    }
}

fn extract_step(run: &RunContext, config: &AppConfig) -> AppResult<OutputPayload> {
    let mut output = OutputPayload::from_run(run);
    output.harvester_type = Some(run.family.harvester_type().to_string());
    output.extract = Some(commands::extract_command(run, config)?);
    output.next_step = Some(Step::Transform);
    Ok(output)
}

async fn transform_step(
    run: &RunContext,
    config: &AppConfig,
    tables: &SourceTables,
    pipeline_store: &Arc<dyn ObjectStore>,
    vendor_store: &Arc<dyn ObjectStore>,
) -> AppResult<OutputPayload> {
    if tables.requires_vendor_normalization(&run.source) {
        vendor::normalize_exports(run, config, vendor_store, pipeline_store).await?;
    }

    let extract_prefix =
        naming::output_prefix(&run.source, run.run_date, run.run_type, Step::Extract);
    let mut output = OutputPayload::from_run(run);
    match storage::list_keys(pipeline_store, &extract_prefix).await? {
        Listing::Found(keys) => {
            let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
            output.transform = Some(commands::transform_commands(run, &keys, config, tables));
            output.next_step = Some(Step::Load);
        }
        // Vendor-normalized sources and full runs always produce extract
        // output; an empty daily harvest elsewhere is a normal outcome.
        Listing::Empty
            if run.run_type == RunType::Daily && !tables.requires_vendor_normalization(&run.source) =>
        {
            info!(source = %run.source, prefix = %extract_prefix, "empty daily harvest");
            output.success = Some(NO_DAILY_RECORDS_MESSAGE.to_string());
        }
        Listing::Empty => {
            warn!(source = %run.source, prefix = %extract_prefix, "expected extract output missing");
            output.failure = Some(NO_EXTRACTED_FILES_MESSAGE.to_string());
        }
    }
    Ok(output)
}

async fn load_step(
    run: &RunContext,
    config: &AppConfig,
    tables: &SourceTables,
    pipeline_store: &Arc<dyn ObjectStore>,
    now: DateTime<Utc>,
) -> AppResult<OutputPayload> {
    let mut output = OutputPayload::from_run(run);
    if !storage::dataset_records_exist(pipeline_store, &run.run_date_string(), &run.run_id).await?
    {
        info!(source = %run.source, run_id = %run.run_id, "no dataset records for run");
        output.success = Some(NO_DATASET_RECORDS_MESSAGE.to_string());
        return Ok(output);
    }

    match commands::load_commands(
        &run.source,
        &run.run_date_string(),
        run.run_type.as_str(),
        &run.run_id,
        config,
        tables,
        now,
    ) {
        LoadCommands::Block(block) => {
            // A load output carries no next-step; the run ends here.
            output.load = Some(block);
        }
        LoadCommands::UnsupportedRunType(message) => {
            warn!(source = %run.source, %message, "load step rejected run type");
            output.failure = Some(message);
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{parse, InputPayload};
    use chrono::TimeZone;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use object_store::memory::InMemory;
    use object_store::path::Path;
    use object_store::PutPayload;

    fn frozen_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 1, 2, 12, 13, 14).unwrap()
    }

    fn empty_store() -> Arc<dyn ObjectStore> {
        Arc::new(InMemory::new())
    }

    async fn store_with_keys(keys: &[&str]) -> Arc<dyn ObjectStore> {
        let store = InMemory::new();
        for key in keys {
            store
                .put(&Path::from(*key), PutPayload::from_static(b"{}"))
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    fn run_for(payload: InputPayload) -> RunContext {
        parse(&payload, &SourceTables::new()).unwrap()
    }

    fn base_payload(next_step: &str, source: &str, run_type: &str) -> InputPayload {
        InputPayload {
            next_step: Some(next_step.to_string()),
            run_date: Some("2022-01-02".to_string()),
            run_type: Some(run_type.to_string()),
            source: Some(source.to_string()),
            run_id: Some("run-abc-123".to_string()),
            run_timestamp: Some("2022-01-02T12:13:14".to_string()),
            ..Default::default()
        }
    }

    async fn dispatch_with(
        run: &RunContext,
        pipeline_store: &Arc<dyn ObjectStore>,
        vendor_store: &Arc<dyn ObjectStore>,
    ) -> OutputPayload {
        dispatch(
            run,
            &AppConfig::for_tests(),
            &SourceTables::new(),
            pipeline_store,
            vendor_store,
            frozen_now(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_extract_step_emits_command_and_next_step() {
        let mut payload = base_payload("extract", "testsource", "daily");
        payload.oai_pmh_host = Some("https://example.com/oai".to_string());
        payload.oai_metadata_format = Some("oai_dc".to_string());
        let run = run_for(payload);

        let output = dispatch_with(&run, &empty_store(), &empty_store()).await;
        assert_eq!(output.harvester_type.as_deref(), Some("oai"));
        assert_eq!(output.next_step, Some(Step::Transform));
        assert!(output.extract.is_some());
        assert!(output.success.is_none() && output.failure.is_none());
    }

    #[tokio::test]
    async fn test_transform_step_emits_one_command_per_key() {
        let run = run_for(base_payload("transform", "testsource", "daily"));
        let pipeline_store = store_with_keys(&[
            "testsource/testsource-2022-01-02-daily-extracted-records-to-index_01.xml",
            "testsource/testsource-2022-01-02-daily-extracted-records-to-index_02.xml",
            "testsource/testsource-2022-01-02-daily-extracted-records-to-delete.xml",
        ])
        .await;

        let output = dispatch_with(&run, &pipeline_store, &empty_store()).await;
        assert_eq!(output.next_step, Some(Step::Load));
        assert_eq!(output.transform.unwrap().files_to_transform.len(), 3);
    }

    #[tokio::test]
    async fn test_transform_step_empty_daily_exits_ok() {
        let run = run_for(base_payload("transform", "testsource", "daily"));
        let output = dispatch_with(&run, &empty_store(), &empty_store()).await;
        assert_eq!(output.next_step, None);
        assert_eq!(output.success.as_deref(), Some(NO_DAILY_RECORDS_MESSAGE));
    }

    #[tokio::test]
    async fn test_transform_step_empty_full_run_exits_error() {
        let run = run_for(base_payload("transform", "testsource", "full"));
        let output = dispatch_with(&run, &empty_store(), &empty_store()).await;
        assert_eq!(output.failure.as_deref(), Some(NO_EXTRACTED_FILES_MESSAGE));
    }

    #[tokio::test]
    async fn test_transform_step_vendor_source_empty_daily_exits_error() {
        let run = run_for(base_payload("transform", "alma", "daily"));
        let output = dispatch_with(&run, &empty_store(), &empty_store()).await;
        assert_eq!(output.failure.as_deref(), Some(NO_EXTRACTED_FILES_MESSAGE));
    }

    #[tokio::test]
    async fn test_transform_step_normalizes_vendor_exports_first() {
        let run = run_for(base_payload("transform", "alma", "daily"));

        let xml = b"<?xml version=\"1.0\"?><records/>";
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(xml.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "records.xml", xml.as_slice())
            .unwrap();
        let archive = builder.into_inner().unwrap().finish().unwrap();

        let vendor_store = empty_store();
        vendor_store
            .put(
                &Path::from("exports/EXPORT_DAILY_20220102_210929[053]_new_1.tar.gz"),
                PutPayload::from(archive),
            )
            .await
            .unwrap();
        let pipeline_store = empty_store();

        let output = dispatch_with(&run, &pipeline_store, &vendor_store).await;
        let transform = output.transform.unwrap();
        assert_eq!(transform.files_to_transform.len(), 1);
        assert!(transform.files_to_transform[0].transform_command[0].ends_with(
            "alma/alma-2022-01-02-daily-extracted-records-to-index_01.xml"
        ));
    }

    #[tokio::test]
    async fn test_load_step_without_dataset_records_exits_ok() {
        let run = run_for(base_payload("load", "testsource", "daily"));
        let output = dispatch_with(&run, &empty_store(), &empty_store()).await;
        assert_eq!(output.load, None);
        assert_eq!(output.success.as_deref(), Some(NO_DATASET_RECORDS_MESSAGE));
    }

    #[tokio::test]
    async fn test_load_step_emits_block_without_next_step() {
        let run = run_for(base_payload("load", "testsource", "daily"));
        let pipeline_store = store_with_keys(&[
            "dataset/data/run_date=2022-01-02/run_id=run-abc-123/part-0000.parquet",
        ])
        .await;

        let output = dispatch_with(&run, &pipeline_store, &empty_store()).await;
        assert_eq!(output.next_step, None);
        let load = output.load.unwrap();
        assert_eq!(load.create_index_command, None);
        assert_eq!(
            load.bulk_update_command,
            vec![
                "bulk-update",
                "--run-date",
                "2022-01-02",
                "--run-id",
                "run-abc-123",
                "--source",
                "testsource",
                "s3://test-pipeline-bucket/dataset",
            ]
        );
    }

    #[tokio::test]
    async fn test_load_step_full_run_includes_create_and_promote() {
        let run = run_for(base_payload("load", "alma", "full"));
        let pipeline_store = store_with_keys(&[
            "dataset/data/run_date=2022-01-02/run_id=run-abc-123/part-0000.parquet",
        ])
        .await;

        let output = dispatch_with(&run, &pipeline_store, &empty_store()).await;
        let load = output.load.unwrap();
        assert_eq!(
            load.create_index_command,
            Some(vec![
                "create".to_string(),
                "--index".to_string(),
                "alma-2022-01-02t12-13-14".to_string(),
            ])
        );
        assert_eq!(
            load.promote_index_command,
            Some(vec![
                "promote".to_string(),
                "--index".to_string(),
                "alma-2022-01-02t12-13-14".to_string(),
                "--alias".to_string(),
                "timdex".to_string(),
            ])
        );
    }
}
