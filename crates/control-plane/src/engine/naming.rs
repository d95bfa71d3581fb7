//! Artifact naming convention.
//!
//! The naming convention is the only contract between pipeline steps: a key
//! produced by one step is consumed unmodified by the next step's command
//! generator, so these strings must be bit-exact.

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::config::SourceFamily;
use crate::payload::{RunType, Step};

/// Load type of an artifact, derived from the filename convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadType {
    /// New or updated records
    Index,
    /// Tombstoned records
    Delete,
}

impl LoadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadType::Index => "index",
            LoadType::Delete => "delete",
        }
    }
}

impl std::fmt::Display for LoadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key prefix for one step's output files:
/// `<source>/<source>-<date>-<run-type>-<step>ed-records`.
pub fn output_prefix(
    source: &str,
    run_date: NaiveDate,
    run_type: RunType,
    step: Step,
) -> String {
    let date = run_date.format("%Y-%m-%d");
    format!("{source}/{source}-{date}-{run_type}-{step}ed-records")
}

/// Full output filename for a step, appending the load type, the optional
/// zero-padded sequence, and the extension.
///
/// Extract output is `jsonl` for GIS and web-crawl sources and `xml` for
/// OAI sources; transform output is `txt` for deletes and `json` otherwise.
pub fn output_filename(
    prefix: &str,
    load_type: LoadType,
    step: Step,
    family: SourceFamily,
    sequence: Option<&str>,
) -> String {
    let extension = match step {
        Step::Extract => match family {
            SourceFamily::Gis | SourceFamily::WebCrawl => "jsonl",
            SourceFamily::Oai => "xml",
        },
        _ => match load_type {
            LoadType::Delete => "txt",
            LoadType::Index => "json",
        },
    };
    let sequence_suffix = sequence.map(|s| format!("_{s}")).unwrap_or_default();
    format!("{prefix}-to-{load_type}{sequence_suffix}.{extension}")
}

/// Inverse of [`output_filename`] for lookups: the load-type token is the
/// segment after the last `-` before the extension, the sequence the
/// optional `_NN` suffix. A lookup helper, not a validator, so the load
/// type comes back as a plain string.
pub fn parse_load_type_and_sequence(filename: &str) -> (String, Option<String>) {
    let stem = filename.split('.').next().unwrap_or_default();
    let mut parts = stem.split('_');
    let load_type = parts
        .next()
        .and_then(|head| head.rsplit('-').next())
        .unwrap_or_default()
        .to_string();
    let sequence = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    (load_type, sequence)
}

/// Index name for a full-run load: `<source>-<now:%Y-%m-%dt%H-%M-%S>`.
pub fn index_name(source: &str, now: DateTime<Utc>) -> String {
    format!("{source}-{}", now.format("%Y-%m-%dt%H-%M-%S"))
}

/// The run date minus one calendar day, used as the from-date anchor of
/// every daily harvest.
pub fn from_date(run_date: NaiveDate) -> String {
    run_date
        .checked_sub_days(Days::new(1))
        .unwrap_or(run_date)
        .format("%Y-%m-%d")
        .to_string()
}
