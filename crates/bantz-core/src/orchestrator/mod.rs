//! Orchestrator - the turn pipeline
//!
//! This module ties the stages together behind the public turn API.
//!
//! # Module Structure
//!
//! - `config`: `OrchestratorConfig` for every stage
//! - `core`: `Orchestrator` struct and builder methods
//! - `session`: per-session state and `SessionHandle::process_turn`
//! - `process`: the turn loop

mod config;
mod core;
mod process;
mod session;


pub use config::{BreakerSettings, OrchestratorConfig};
pub use core::Orchestrator;
pub use process::{CANCELLED_REPLY, CONFIRMATION_DENIED_REPLY};
pub use session::{Session, SessionHandle};
