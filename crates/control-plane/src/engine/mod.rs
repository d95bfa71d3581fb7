//! Step execution engine: artifact naming, command generation, and the
//! dispatcher that turns a validated run into the next step's output.

pub mod commands;
pub mod dispatcher;
pub mod naming;

pub use dispatcher::dispatch;
