//! Command generation for the external pipeline workers.
//!
//! Each function builds the ordered argument vector one worker invocation
//! needs. Token order is significant and source-family specific; the
//! shapes here are the contract with the harvester, transform, and loader
//! binaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, SourceTables};
use crate::error::{AppError, AppResult};
use crate::payload::{HarvestSpec, RunContext, RunType, Step};

use super::naming;
use super::naming::LoadType;

/// OAI sources harvested with `--method=get` rather than list requests.
const OAI_GET_METHOD_SOURCES: [&str; 2] = ["aspace", "dspace"];

/// Extract command block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractBlock {
    #[serde(rename = "extract-command")]
    pub extract_command: Vec<String>,
}

/// Transform command block: one command per discovered extract file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformBlock {
    #[serde(rename = "files-to-transform")]
    pub files_to_transform: Vec<TransformFile>,
}

/// A single transform invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformFile {
    #[serde(rename = "transform-command")]
    pub transform_command: Vec<String>,
}

/// Load command block. Daily runs carry only the bulk update; full runs
/// additionally create and promote a new index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBlock {
    #[serde(rename = "create-index-command", skip_serializing_if = "Option::is_none")]
    pub create_index_command: Option<Vec<String>>,

    #[serde(rename = "bulk-update-command")]
    pub bulk_update_command: Vec<String>,

    #[serde(rename = "promote-index-command", skip_serializing_if = "Option::is_none")]
    pub promote_index_command: Option<Vec<String>>,
}

/// Result of load-command generation. An unrecognized run type is a
/// structured failure the dispatcher reports, not a raised error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadCommands {
    Block(LoadBlock),
    UnsupportedRunType(String),
}

/// Build the extract command for the run's source family.
///
/// `--verbose` is prepended for every family when verbosity is enabled.
pub fn extract_command(run: &RunContext, config: &AppConfig) -> AppResult<ExtractBlock> {
    let harvest = run.harvest.as_ref().ok_or_else(|| {
        AppError::Internal("extract step dispatched without harvest fields".to_string())
    })?;

    let prefix = naming::output_prefix(&run.source, run.run_date, run.run_type, Step::Extract);
    let output_file =
        naming::output_filename(&prefix, LoadType::Index, Step::Extract, run.family, None);
    let output_uri = config.storage_uri(&output_file);

    let mut command = match harvest {
        HarvestSpec::Oai {
            host,
            metadata_format,
            set_spec,
        } => oai_extract_command(run, host, metadata_format, set_spec.as_deref(), &output_uri),
        HarvestSpec::Gis => gis_extract_command(run, &output_uri),
        HarvestSpec::WebCrawl {
            config_yaml_file,
            sitemaps,
            sitemap_urls_output_file,
            previous_sitemap_urls_file,
        } => web_crawl_extract_command(
            run,
            config_yaml_file,
            sitemaps,
            sitemap_urls_output_file,
            previous_sitemap_urls_file.as_deref(),
            &output_uri,
        ),
    };

    if run.verbose {
        command.insert(0, "--verbose".to_string());
    }

    Ok(ExtractBlock {
        extract_command: command,
    })
}

fn oai_extract_command(
    run: &RunContext,
    host: &str,
    metadata_format: &str,
    set_spec: Option<&str>,
    output_uri: &str,
) -> Vec<String> {
    let mut command = vec![
        format!("--host={host}"),
        format!("--output-file={output_uri}"),
        "harvest".to_string(),
    ];
    if OAI_GET_METHOD_SOURCES.contains(&run.source.as_str()) {
        command.push("--method=get".to_string());
    }
    command.push(format!("--metadata-format={metadata_format}"));
    match run.run_type {
        RunType::Daily => {
            command.push(format!("--from-date={}", naming::from_date(run.run_date)));
        }
        RunType::Full => command.push("--exclude-deleted".to_string()),
    }
    if let Some(set_spec) = set_spec {
        command.push(format!("--set-spec={set_spec}"));
    }
    command
}

fn gis_extract_command(run: &RunContext, output_uri: &str) -> Vec<String> {
    let harvest_type = match run.run_type {
        RunType::Daily => "incremental",
        RunType::Full => "full",
    };
    let mut command = vec![
        "harvest".to_string(),
        format!("--harvest-type={harvest_type}"),
    ];
    if run.run_type == RunType::Daily {
        command.push(format!("--from-date={}", naming::from_date(run.run_date)));
    }
    command.push(format!("--output-file={output_uri}"));
    // The GIS harvester addresses repositories by the source id minus the
    // family prefix: gismit -> mit, gisogm -> ogm.
    command.push(
        run.source
            .strip_prefix("gis")
            .unwrap_or(&run.source)
            .to_string(),
    );
    command
}

fn web_crawl_extract_command(
    run: &RunContext,
    config_yaml_file: &str,
    sitemaps: &[String],
    sitemap_urls_output_file: &str,
    previous_sitemap_urls_file: Option<&str>,
    output_uri: &str,
) -> Vec<String> {
    let mut command = vec![
        "harvest".to_string(),
        format!("--config-yaml-file={config_yaml_file}"),
        format!("--records-output-file={output_uri}"),
    ];
    for sitemap in sitemaps {
        command.push(format!("--sitemap={sitemap}"));
    }
    if run.run_type == RunType::Daily {
        command.push(format!(
            "--sitemap-from-date={}",
            naming::from_date(run.run_date)
        ));
    }
    command.push(format!(
        "--sitemap-urls-output-file={sitemap_urls_output_file}"
    ));
    if run.run_type == RunType::Daily {
        if let Some(previous) = previous_sitemap_urls_file {
            command.push(format!("--previous-sitemap-urls-file={previous}"));
        }
    }
    command
}

/// Build one transform command per discovered extract file.
///
/// Files are not merged; index/delete disambiguation is resolved by the
/// transform tool from file content, not here.
pub fn transform_commands(
    run: &RunContext,
    extract_keys: &[String],
    config: &AppConfig,
    tables: &SourceTables,
) -> TransformBlock {
    let exclusion_list_path = tables
        .exclusion_list_key(&run.source)
        .map(|key| config.storage_uri(&key));

    let files_to_transform = extract_keys
        .iter()
        .map(|key| {
            let mut command = vec![
                format!("--input-file={}", config.storage_uri(key)),
                format!("--output-location={}", config.dataset_location()),
                format!("--source={}", run.source),
                format!("--run-id={}", run.run_id),
                format!("--run-timestamp={}", run.run_timestamp),
            ];
            if let Some(path) = &exclusion_list_path {
                command.push(format!("--exclusion-list-path={path}"));
            }
            TransformFile {
                transform_command: command,
            }
        })
        .collect();

    TransformBlock { files_to_transform }
}

/// Build the load command set for indexing the run's dataset records.
///
/// `run_type` is the raw token rather than [`RunType`]: an unrecognized
/// value must surface as the structured [`LoadCommands::UnsupportedRunType`]
/// outcome for callers to branch on, and a parsed enum cannot carry one.
/// Payloads routed through [`crate::payload::parse`] never produce it.
///
/// `now` is injected so full-run index names are reproducible in tests.
pub fn load_commands(
    source: &str,
    run_date: &str,
    run_type: &str,
    run_id: &str,
    config: &AppConfig,
    tables: &SourceTables,
    now: DateTime<Utc>,
) -> LoadCommands {
    let mut bulk_update_command = vec![
        "bulk-update".to_string(),
        "--run-date".to_string(),
        run_date.to_string(),
        "--run-id".to_string(),
        run_id.to_string(),
    ];

    match run_type {
        "daily" => {
            bulk_update_command.push("--source".to_string());
            bulk_update_command.push(source.to_string());
            bulk_update_command.push(config.dataset_location());
            LoadCommands::Block(LoadBlock {
                create_index_command: None,
                bulk_update_command,
                promote_index_command: None,
            })
        }
        "full" => {
            let index = naming::index_name(source, now);
            bulk_update_command.push("--index".to_string());
            bulk_update_command.push(index.clone());
            bulk_update_command.push(config.dataset_location());

            let mut promote_index_command = vec![
                "promote".to_string(),
                "--index".to_string(),
                index.clone(),
            ];
            for alias in tables.alias_groups_for(source) {
                promote_index_command.push("--alias".to_string());
                promote_index_command.push(alias.to_string());
            }

            LoadCommands::Block(LoadBlock {
                create_index_command: Some(vec![
                    "create".to_string(),
                    "--index".to_string(),
                    index,
                ]),
                bulk_update_command,
                promote_index_command: Some(promote_index_command),
            })
        }
        other => LoadCommands::UnsupportedRunType(format!("Unexpected run-type: '{other}'")),
    }
}
