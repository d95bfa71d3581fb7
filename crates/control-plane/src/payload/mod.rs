//! Input/output payloads for the per-step invocation.

pub mod parser;
pub mod types;

pub use parser::parse;
pub use types::{
    HarvestSpec, InputPayload, OutputPayload, RunContext, RunType, Step,
};
