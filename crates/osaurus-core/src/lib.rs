//! Types shared by every Osaurus feature crate

#![allow(clippy::must_use_candidate)]

mod context;
mod error;
mod log;
mod response;

pub use context::{AGENT_ID_HEADER, RequestContext};
pub use error::HttpError;
pub use log::{ChatLogDetails, PendingChatLog, ToolCallLogEntry};
pub use response::{JSON_CONTENT_TYPE, json_error, json_response};
