//! Core crate for Palaver: wire types, the conversation history store,
//! configuration, and shared utilities.

pub mod config;
pub mod history;
pub mod types;
pub mod utils;
