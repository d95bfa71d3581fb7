//! Pipeline Control Plane Library
//!
//! This crate provides the control-plane server for a multi-stage
//! record-harvesting pipeline, handling:
//!
//! - **Payload Validation**: Check and resolve step inputs from the
//!   workflow engine into a typed run descriptor
//! - **Command Generation**: Build the exact CLI invocations for the
//!   extract, transform, and load workers
//! - **Artifact Naming**: Derive and parse the canonical bucket keys for
//!   per-step output files
//! - **Vendor Normalization**: Re-shape raw vendor export archives into
//!   pipeline-named extract files
//! - **Step Dispatch**: Drive the `extract -> transform -> load` state
//!   machine, including the empty-harvest exit policies
//!
//! ## Architecture
//!
//! The control plane is stateless between invocations: every request
//! carries the full run identity, and all shared state lives in the
//! pipeline and vendor object-store buckets.
//!
//! ## Modules
//!
//! - [`config`]: Configuration from environment variables plus the static
//!   per-source classification tables
//! - [`payload`]: Input/output payload types and validation
//! - [`engine`]: Artifact naming, command generation, and step dispatch
//! - [`storage`]: Prefix listing and dataset existence probes
//! - [`vendor`]: Vendor export archive normalization
//! - [`error`]: Custom error types with Axum integration
//! - [`handlers`]: HTTP route handlers
//! - [`state`]: Shared application state

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod payload;
pub mod state;
pub mod storage;
pub mod vendor;

pub use error::{AppError, AppResult};
