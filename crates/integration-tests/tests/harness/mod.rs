#![allow(dead_code)]

pub mod config;
pub mod engine;
pub mod server;
pub mod upstream;

/// `data:` payloads of an SSE body, in order
pub fn sse_data(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(str::to_owned)
        .collect()
}

/// `event:` names of an SSE body, in order
pub fn sse_events(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix("event: "))
        .map(str::to_owned)
        .collect()
}
