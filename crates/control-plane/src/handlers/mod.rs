//! HTTP handlers for the pipeline control plane API.

pub mod health;
pub mod step;

pub use health::health_check;
pub use step::handle_step;
