//! Static source classification tables.
//!
//! Built once at process start and passed explicitly into the dispatcher and
//! command generators; nothing here is looked up ambiently.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Harvest family of a source, resolved once at payload-parse time.
///
/// The family determines the shape of the extract command and the file
/// extension of extract output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFamily {
    /// OAI-PMH harvester (the default family)
    Oai,
    /// GIS harvester
    Gis,
    /// Web-crawl harvester
    WebCrawl,
}

impl SourceFamily {
    /// Harvester label emitted in extract outputs so the workflow engine
    /// can route the step to the right worker.
    pub fn harvester_type(&self) -> &'static str {
        match self {
            SourceFamily::Oai => "oai",
            SourceFamily::Gis => "geo",
            SourceFamily::WebCrawl => "webcrawl",
        }
    }
}

/// Immutable source classification tables.
#[derive(Debug, Clone)]
pub struct SourceTables {
    /// Sources harvested by the GIS harvester
    gis_sources: BTreeSet<String>,
    /// Sources harvested by the web-crawl harvester
    web_crawl_sources: BTreeSet<String>,
    /// Sources whose upstream export arrives as vendor-named tar archives
    vendor_sources: BTreeSet<String>,
    /// Alias group name -> member source ids, in promotion order
    index_aliases: Vec<(String, Vec<String>)>,
    /// Sources with a configured exclusion list for the transform step
    exclusion_list_sources: BTreeSet<String>,
}

fn string_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SourceTables {
    fn default() -> Self {
        Self {
            gis_sources: string_set(&["gismit", "gisogm"]),
            web_crawl_sources: string_set(&["mitlibwebsite"]),
            vendor_sources: string_set(&["alma"]),
            index_aliases: vec![
                (
                    "rdi".to_string(),
                    vec!["jpal".to_string(), "whoas".to_string(), "zenodo".to_string()],
                ),
                (
                    "timdex".to_string(),
                    vec!["alma".to_string(), "aspace".to_string(), "dspace".to_string()],
                ),
                (
                    "geo".to_string(),
                    vec!["gismit".to_string(), "gisogm".to_string()],
                ),
            ],
            exclusion_list_sources: string_set(&["libguides"]),
        }
    }
}

impl SourceTables {
    /// Create the tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the harvest family of a source. Sources not classified as
    /// GIS or web-crawl are harvested over OAI-PMH.
    pub fn family(&self, source: &str) -> SourceFamily {
        if self.gis_sources.contains(source) {
            SourceFamily::Gis
        } else if self.web_crawl_sources.contains(source) {
            SourceFamily::WebCrawl
        } else {
            SourceFamily::Oai
        }
    }

    /// Whether the source's exports must be normalized from vendor-named
    /// archives before extract output can be discovered.
    pub fn requires_vendor_normalization(&self, source: &str) -> bool {
        self.vendor_sources.contains(source)
    }

    /// Alias groups a source's full-run index is promoted under.
    pub fn alias_groups_for(&self, source: &str) -> Vec<&str> {
        self.index_aliases
            .iter()
            .filter(|(_, members)| members.iter().any(|m| m == source))
            .map(|(alias, _)| alias.as_str())
            .collect()
    }

    /// Storage key of the source's exclusion list, if one is configured.
    pub fn exclusion_list_key(&self, source: &str) -> Option<String> {
        self.exclusion_list_sources
            .contains(source)
            .then(|| format!("config/{source}/exclusions.csv"))
    }
}
