//! Conversions between wire formats and the internal chat types
//!
//! Inbound conversions are total: every decodable request maps to a
//! [`ChatRequest`](crate::types::ChatRequest). Outbound builders render a
//! finished answer into each protocol's non-streaming body.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod responses;

/// Current time as unix seconds
pub(crate) fn unix_now() -> i64 {
    jiff::Timestamp::now().as_second()
}

/// Response id with a protocol prefix
pub(crate) fn response_id(prefix: &str) -> String {
    format!("{prefix}{}", uuid::Uuid::new_v4().simple())
}
