//! Internal canonical chat types
//!
//! Every wire protocol converts into and out of these; nothing past the
//! handler boundary sees a vendor format.

mod message;
mod request;
mod response;
mod tool;

pub use message::{FunctionCall, Message, Role, ToolCall};
pub use request::{ChatParams, ChatRequest, estimate_tokens};
pub use response::{Completion, FinishReason, Usage};
pub use tool::{ToolDefinition, ToolInvocation};
