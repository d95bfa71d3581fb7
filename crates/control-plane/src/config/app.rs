//! Application configuration for the pipeline control plane server.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// Environment variables are prefixed with `PIPELINE_`:
/// - `PIPELINE_STORAGE_BUCKET`: Pipeline artifact bucket (required)
/// - `PIPELINE_VENDOR_EXPORT_BUCKET`: Vendor export drop bucket (required)
/// - `PIPELINE_VENDOR_EXPORT_PREFIX`: Key prefix for vendor archives (default: "exports")
/// - `PIPELINE_HOST`: Server bind address (default: "0.0.0.0")
/// - `PIPELINE_PORT`: Server port (default: 8083)
/// - `PIPELINE_DEBUG`: Enable debug mode (default: false)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Bucket holding pipeline artifacts and the transformed dataset
    pub storage_bucket: String,

    /// Bucket the vendor drops export archives into
    pub vendor_export_bucket: String,

    /// Key prefix the vendor writes archives under
    #[serde(default = "default_vendor_export_prefix")]
    pub vendor_export_prefix: String,

    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable debug mode
    #[serde(default)]
    pub debug: bool,
}

fn default_vendor_export_prefix() -> String {
    "exports".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8083
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `PIPELINE_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("PIPELINE_").from_env::<AppConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Full storage URI for a key in the pipeline bucket, as workers see it.
    pub fn storage_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.storage_bucket, key)
    }

    /// Root location of the transformed-records dataset.
    pub fn dataset_location(&self) -> String {
        self.storage_uri("dataset")
    }
}

#[cfg(test)]
impl AppConfig {
    /// Fixed configuration for unit tests.
    pub fn for_tests() -> Self {
        AppConfig {
            storage_bucket: "test-pipeline-bucket".to_string(),
            vendor_export_bucket: "test-vendor-bucket".to_string(),
            vendor_export_prefix: default_vendor_export_prefix(),
            host: default_host(),
            port: default_port(),
            debug: false,
        }
    }
}
