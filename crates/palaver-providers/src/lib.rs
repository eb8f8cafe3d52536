//! Client for the remote reasoning service.
//!
//! The service is an opaque request/response boundary: Palaver sends a
//! message list plus tool definitions and gets back either a final answer
//! or tool-call requests, each stamped with a response id.

pub mod http;
pub mod traits;

pub use http::HttpModelClient;
pub use traits::{ModelClient, ModelRequest};
