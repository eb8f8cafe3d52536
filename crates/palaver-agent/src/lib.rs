//! Agent core for Palaver: conversation-context resolution, the sandboxed
//! tool runtime, the bounded model ↔ tool loop, and the finalize pipeline
//! that commits each request's side effects.

pub mod agent_loop;
pub mod context;
pub mod finalize;
pub mod tools;

pub use agent_loop::{AgentLoop, LoopOutcome};
pub use context::{resolve_context, ConversationContext, RequestOptions};
pub use finalize::{FinalizeAction, FinalizeOutcome, FinalizePipeline, FinalizeRequest, OutputDelivery};
pub use tools::runtime::ToolRuntime;
