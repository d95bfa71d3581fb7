//! Configuration for the pipeline control plane.

pub mod app;
pub mod sources;

pub use app::AppConfig;
pub use sources::{SourceFamily, SourceTables};
