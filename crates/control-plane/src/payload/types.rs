//! Payload types exchanged with the workflow engine.
//!
//! The input payload arrives once per step; the output payload echoes the
//! run identity and carries exactly one of: a command block plus the next
//! step, or a terminal success/failure message.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::SourceFamily;
use crate::engine::commands::{ExtractBlock, LoadBlock, TransformBlock};

/// Pipeline step, dispatched by the workflow engine in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Extract,
    Transform,
    Load,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Extract => "extract",
            Step::Transform => "transform",
            Step::Load => "load",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run type: incremental daily run or complete re-harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Daily,
    Full,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Daily => "daily",
            RunType::Full => "full",
        }
    }
}

impl std::fmt::Display for RunType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw input payload from the workflow engine.
///
/// All fields are optional at the serde layer; [`crate::payload::parse`]
/// enforces presence and value constraints so that missing-field errors
/// carry the field names rather than a serde message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputPayload {
    #[serde(rename = "next-step")]
    pub next_step: Option<String>,

    #[serde(rename = "run-date")]
    pub run_date: Option<String>,

    #[serde(rename = "run-type")]
    pub run_type: Option<String>,

    pub source: Option<String>,

    /// Run id; generated when absent.
    #[serde(rename = "run-id")]
    pub run_id: Option<String>,

    /// Run timestamp; generated from the current time when absent.
    #[serde(rename = "run-timestamp")]
    pub run_timestamp: Option<String>,

    /// Accepts a boolean or the strings "true"/"false" (any case).
    #[serde(default, deserialize_with = "verbose_flag")]
    pub verbose: bool,

    // OAI-PMH harvest fields
    #[serde(rename = "oai-pmh-host")]
    pub oai_pmh_host: Option<String>,
    #[serde(rename = "oai-metadata-format")]
    pub oai_metadata_format: Option<String>,
    #[serde(rename = "oai-set-spec")]
    pub oai_set_spec: Option<String>,

    // Web-crawl harvest fields
    #[serde(rename = "btrix-config-yaml-file")]
    pub btrix_config_yaml_file: Option<String>,
    #[serde(rename = "btrix-sitemaps")]
    pub btrix_sitemaps: Option<Vec<String>>,
    #[serde(rename = "btrix-sitemap-urls-output-file")]
    pub btrix_sitemap_urls_output_file: Option<String>,
    #[serde(rename = "btrix-previous-sitemap-urls-file")]
    pub btrix_previous_sitemap_urls_file: Option<String>,
}

/// Verbosity arrives as a boolean or a string depending on the caller.
fn verbose_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Verbosity {
        Flag(bool),
        Text(String),
    }

    Ok(match Option::<Verbosity>::deserialize(deserializer)? {
        Some(Verbosity::Flag(flag)) => flag,
        Some(Verbosity::Text(text)) => text.eq_ignore_ascii_case("true"),
        None => false,
    })
}

/// Source-family-specific harvest fields, present only for extract steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestSpec {
    Oai {
        host: String,
        metadata_format: String,
        set_spec: Option<String>,
    },
    Gis,
    WebCrawl {
        config_yaml_file: String,
        sitemaps: Vec<String>,
        sitemap_urls_output_file: String,
        /// Required for daily crawls, which anchor against the prior run's URL set.
        previous_sitemap_urls_file: Option<String>,
    },
}

/// Validated run descriptor, built fresh from the input payload each
/// invocation and never persisted.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub source: String,
    pub run_date: NaiveDate,
    pub run_type: RunType,
    pub next_step: Step,
    pub run_id: String,
    pub run_timestamp: String,
    pub verbose: bool,
    pub family: SourceFamily,
    /// Present only when `next_step` is extract.
    pub harvest: Option<HarvestSpec>,
}

impl RunContext {
    /// Run date in the canonical `YYYY-MM-DD` form used in artifact keys.
    pub fn run_date_string(&self) -> String {
        self.run_date.format("%Y-%m-%d").to_string()
    }
}

/// Output payload returned to the workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPayload {
    #[serde(rename = "run-date")]
    pub run_date: String,

    #[serde(rename = "run-type")]
    pub run_type: String,

    pub source: String,

    pub verbose: bool,

    /// Which harvester worker the engine should run the extract step with.
    #[serde(rename = "harvester-type", skip_serializing_if = "Option::is_none")]
    pub harvester_type: Option<String>,

    #[serde(rename = "next-step", skip_serializing_if = "Option::is_none")]
    pub next_step: Option<Step>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractBlock>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformBlock>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadBlock>,

    /// Terminal exit-ok message: there is legitimately no work for this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,

    /// Terminal exit-error message: expected artifacts are missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl OutputPayload {
    /// Base output echoing the run identity, with no outcome attached yet.
    pub fn from_run(run: &RunContext) -> Self {
        Self {
            run_date: run.run_date_string(),
            run_type: run.run_type.as_str().to_string(),
            source: run.source.clone(),
            verbose: run.verbose,
            harvester_type: None,
            next_step: None,
            extract: None,
            transform: None,
            load: None,
            success: None,
            failure: None,
        }
    }
}
