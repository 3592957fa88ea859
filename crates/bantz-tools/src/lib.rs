//! Bantz Tools - Tool Registry and Execution Engine
//!
//! This crate provides the tool contract the Bantz turn pipeline calls into:
//! - Registry: capability objects looked up by name, with risk metadata
//! - Runner: per-call timeout enforcement
//! - Idempotency: duplicate suppression for mutating tools
//! - Builtins: `system.time` and `system.status`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod error;
pub mod idempotency;
pub mod registry;
pub mod runner;

pub use builtins::register_builtins;
pub use error::{Error, Result};
pub use idempotency::IdempotentTool;
pub use registry::{RiskLevel, Tool, ToolDefinition, ToolRegistry, ToolResult};
pub use runner::{ExecutionOptions, RunnerConfig, ToolRunner};
