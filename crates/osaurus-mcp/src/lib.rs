#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod builtin;
pub mod error;
pub mod registry;
pub mod router;

pub use builtin::BuiltinToolRegistry;
pub use error::McpError;
pub use registry::{ToolRegistry, ToolSpec};
pub use router::mcp_router;
