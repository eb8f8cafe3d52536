//! Tool system: trait, sandbox, runtime and the built-in tools.

pub mod base;
pub mod command;
pub mod diagram;
pub mod filesystem;
pub mod runtime;
pub mod sandbox;
pub mod sql;

pub use base::{Tool, ToolContext};
pub use runtime::ToolRuntime;
pub use sandbox::{resolve_workspace_path, ToolError};
