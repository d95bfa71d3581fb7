//! Input payload validation and run-context resolution.
//!
//! Turns the raw [`InputPayload`] into a [`RunContext`] with the source
//! family resolved once, or fails with a validation error naming exactly
//! what is wrong. No storage access happens here.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::config::{SourceFamily, SourceTables};
use crate::error::{AppError, AppResult};

use super::types::{HarvestSpec, InputPayload, RunContext, RunType, Step};

/// Fields every payload must carry.
const REQUIRED_FIELDS: [&str; 4] = ["next-step", "run-date", "run-type", "source"];

/// Harvest fields required for OAI-PMH extract steps.
const REQUIRED_OAI_FIELDS: [&str; 2] = ["oai-pmh-host", "oai-metadata-format"];

/// Harvest fields required for web-crawl extract steps.
const REQUIRED_BTRIX_FIELDS: [&str; 3] = [
    "btrix-config-yaml-file",
    "btrix-sitemaps",
    "btrix-sitemap-urls-output-file",
];

const VALID_STEPS: [&str; 3] = ["extract", "transform", "load"];
const VALID_RUN_TYPES: [&str; 2] = ["full", "daily"];
const VALID_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y-%m-%dT%H:%M:%SZ"];

/// Validate the payload and resolve it into a [`RunContext`].
pub fn parse(payload: &InputPayload, tables: &SourceTables) -> AppResult<RunContext> {
    check_required_fields(payload)?;

    // Unwraps after presence check
    let next_step = parse_step(payload.next_step.as_deref().unwrap_or_default())?;
    let run_type = parse_run_type(payload.run_type.as_deref().unwrap_or_default())?;
    let run_date = parse_run_date(payload.run_date.as_deref().unwrap_or_default())?;
    let source = payload.source.clone().unwrap_or_default();

    let family = tables.family(&source);
    let harvest = if next_step == Step::Extract {
        Some(harvest_spec(payload, family, run_type)?)
    } else {
        None
    };

    Ok(RunContext {
        source,
        run_date,
        run_type,
        next_step,
        run_id: payload
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        run_timestamp: payload.run_timestamp.clone().unwrap_or_else(|| {
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
        }),
        verbose: payload.verbose,
        family,
        harvest,
    })
}

fn check_required_fields(payload: &InputPayload) -> AppResult<()> {
    let present = [
        payload.next_step.is_some(),
        payload.run_date.is_some(),
        payload.run_type.is_some(),
        payload.source.is_some(),
    ];
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .zip(present)
        .filter(|(_, present)| !present)
        .map(|(field, _)| *field)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Input must include all required fields. Missing fields: {missing:?}"
        )))
    }
}

fn parse_step(value: &str) -> AppResult<Step> {
    match value {
        "extract" => Ok(Step::Extract),
        "transform" => Ok(Step::Transform),
        "load" => Ok(Step::Load),
        other => Err(AppError::Validation(format!(
            "Input 'next-step' value must be one of: {VALID_STEPS:?}. \
             Value provided was '{other}'"
        ))),
    }
}

fn parse_run_type(value: &str) -> AppResult<RunType> {
    match value {
        "daily" => Ok(RunType::Daily),
        "full" => Ok(RunType::Full),
        other => Err(AppError::Validation(format!(
            "Input 'run-type' value must be one of: {VALID_RUN_TYPES:?}. \
             Value provided was '{other}'"
        ))),
    }
}

/// Accepts an ISO date or date-time and returns the calendar day.
fn parse_run_date(value: &str) -> AppResult<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%SZ") {
        return Ok(datetime.date());
    }
    Err(AppError::Validation(format!(
        "Input 'run-date' value must be one of the following date string formats: \
         {VALID_DATE_FORMATS:?}. Value provided was '{value}'"
    )))
}

/// Build the family-specific harvest spec, enforcing the per-family
/// required fields of extract payloads.
fn harvest_spec(
    payload: &InputPayload,
    family: SourceFamily,
    run_type: RunType,
) -> AppResult<HarvestSpec> {
    match family {
        SourceFamily::Gis => Ok(HarvestSpec::Gis),
        SourceFamily::Oai => {
            let present = [
                payload.oai_pmh_host.is_some(),
                payload.oai_metadata_format.is_some(),
            ];
            check_harvest_fields(&REQUIRED_OAI_FIELDS, &present)?;
            Ok(HarvestSpec::Oai {
                host: payload.oai_pmh_host.clone().unwrap_or_default(),
                metadata_format: payload.oai_metadata_format.clone().unwrap_or_default(),
                set_spec: payload.oai_set_spec.clone(),
            })
        }
        SourceFamily::WebCrawl => {
            let present = [
                payload.btrix_config_yaml_file.is_some(),
                payload.btrix_sitemaps.is_some(),
                payload.btrix_sitemap_urls_output_file.is_some(),
            ];
            check_harvest_fields(&REQUIRED_BTRIX_FIELDS, &present)?;
            if run_type == RunType::Daily && payload.btrix_previous_sitemap_urls_file.is_none() {
                return Err(AppError::Validation(
                    "Field 'btrix-previous-sitemap-urls-file' required when \
                     'run-type=daily'"
                        .to_string(),
                ));
            }
            Ok(HarvestSpec::WebCrawl {
                config_yaml_file: payload.btrix_config_yaml_file.clone().unwrap_or_default(),
                sitemaps: payload.btrix_sitemaps.clone().unwrap_or_default(),
                sitemap_urls_output_file: payload
                    .btrix_sitemap_urls_output_file
                    .clone()
                    .unwrap_or_default(),
                previous_sitemap_urls_file: payload.btrix_previous_sitemap_urls_file.clone(),
            })
        }
    }
}

fn check_harvest_fields(required: &[&str], present: &[bool]) -> AppResult<()> {
    let missing: Vec<&str> = required
        .iter()
        .zip(present)
        .filter(|(_, present)| !**present)
        .map(|(field, _)| *field)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Input must include all required harvest fields when starting with \
             harvest step. Missing fields: {missing:?}"
        )))
    }
}
