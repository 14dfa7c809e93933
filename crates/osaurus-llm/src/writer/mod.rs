//! Per-protocol streaming response writers
//!
//! Every streaming route picks one [`StreamWriter`] and hands it to [`drive`],
//! which replays the engine's events through it. Writers only format: they
//! never buffer or reorder across events.
//!
//! All writers share [`WriterCore`], which enforces the common contract.
//! Headers go out at most once and before any content. A response records
//! exactly one terminal outcome (finish or error). `write_end` then emits
//! exactly one terminal frame and closes the sink. Nothing may be written
//! after that.

mod anthropic;
mod drive;
mod ndjson;
mod openai;
mod responses;
mod sink;
#[cfg(test)]
mod testing;

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use serde::Serialize;
use thiserror::Error;

pub use anthropic::AnthropicWriter;
pub use drive::{StreamSummary, drive};
pub use ndjson::NdjsonWriter;
pub use openai::OpenAiWriter;
pub use responses::ResponsesWriter;
pub use sink::{ChannelSink, FrameSink, StreamingBody, channel};

use crate::types::FinishReason;

/// Lifecycle of one streaming response
///
/// The states are shared by every writer; what a transition puts on the wire
/// is up to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Nothing sent yet
    NotStarted,
    /// Response head sent
    HeadersSent,
    /// Opening frames sent, if the protocol has any (NDJSON has none)
    RoleAnnounced,
    /// At least one text delta written
    ContentOpen,
    /// A tool call is being replayed
    ToolOpen,
    /// Terminal frame written; the sink is closed
    Finished,
}

#[derive(Debug, Error)]
pub enum WriterError {
    /// The client went away; the response is abandoned
    #[error("client disconnected")]
    Disconnected,

    #[error("`{operation}` is not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: WriterState,
    },

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// How a response ended, decided before its terminal frame is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Finished(FinishReason),
    Failed(String),
}

impl Terminal {
    pub const fn finish_reason(&self) -> FinishReason {
        match self {
            Self::Finished(reason) => *reason,
            Self::Failed(_) => FinishReason::Error,
        }
    }
}

/// One wire protocol's framing of a streamed answer
#[async_trait]
pub trait StreamWriter: Send + Sync {
    fn state(&self) -> WriterState;

    /// Byte window for replaying tool arguments; `None` sends them whole
    fn argument_window(&self) -> Option<usize>;

    /// Prefix for generated tool call ids
    fn call_id_prefix(&self) -> &'static str {
        "call_"
    }

    async fn write_headers(&mut self, extra: &HeaderMap) -> Result<(), WriterError>;

    async fn write_role_or_start(&mut self) -> Result<(), WriterError>;

    async fn write_text_delta(&mut self, text: &str) -> Result<(), WriterError>;

    async fn write_tool_call_start(&mut self, call_id: &str, name: &str) -> Result<(), WriterError>;

    async fn write_tool_call_delta(&mut self, fragment: &str) -> Result<(), WriterError>;

    async fn write_tool_call_done(&mut self) -> Result<(), WriterError>;

    /// Record a normal end; may emit closing frames but not the terminal one
    async fn write_finish(&mut self, reason: FinishReason) -> Result<(), WriterError>;

    /// Record a failure; may emit an in-band error frame but not the terminal one
    async fn write_error(&mut self, message: &str) -> Result<(), WriterError>;

    /// Emit the single terminal frame and close the stream
    async fn write_end(&mut self) -> Result<(), WriterError>;

    /// Resolves once the client stops reading
    async fn disconnected(&self);
}

const STREAMING: &[WriterState] = &[
    WriterState::HeadersSent,
    WriterState::RoleAnnounced,
    WriterState::ContentOpen,
    WriterState::ToolOpen,
];

const CONTENT: &[WriterState] = &[WriterState::RoleAnnounced, WriterState::ContentOpen];

/// State and sink shared by every writer
pub struct WriterCore {
    sink: Box<dyn FrameSink>,
    state: WriterState,
    terminal: Option<Terminal>,
}

impl WriterCore {
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Self {
            sink,
            state: WriterState::NotStarted,
            terminal: None,
        }
    }

    pub const fn state(&self) -> WriterState {
        self.state
    }

    pub const fn terminal(&self) -> Option<&Terminal> {
        self.terminal.as_ref()
    }

    fn check(&self, operation: &'static str, allowed: &[WriterState]) -> Result<(), WriterError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(WriterError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Send the response head; only valid once, first
    pub async fn send_headers(&mut self, headers: HeaderMap) -> Result<(), WriterError> {
        self.check("write_headers", &[WriterState::NotStarted])?;
        self.sink.send_head(headers).await?;
        self.state = WriterState::HeadersSent;
        Ok(())
    }

    /// Move to `next` if the current state is one of `allowed`
    pub fn enter(
        &mut self,
        operation: &'static str,
        allowed: &[WriterState],
        next: WriterState,
    ) -> Result<(), WriterError> {
        self.check(operation, allowed)?;
        self.state = next;
        Ok(())
    }

    /// Allow text from the role announcement onwards
    pub fn enter_content(&mut self, operation: &'static str) -> Result<(), WriterError> {
        self.enter(operation, CONTENT, WriterState::ContentOpen)
    }

    /// Allow a tool call to open after the role announcement or text
    pub fn enter_tool(&mut self, operation: &'static str) -> Result<(), WriterError> {
        self.enter(operation, CONTENT, WriterState::ToolOpen)
    }

    pub fn expect_tool(&self, operation: &'static str) -> Result<(), WriterError> {
        self.check(operation, &[WriterState::ToolOpen])
    }

    /// Send a non-terminal frame
    pub async fn send(&mut self, operation: &'static str, frame: Bytes) -> Result<(), WriterError> {
        self.check(operation, STREAMING)?;
        if self.terminal.is_some() {
            return Err(WriterError::InvalidState {
                operation,
                state: self.state,
            });
        }
        self.sink.send(frame).await
    }

    /// Remember how the response ended; at most once
    pub fn record(&mut self, operation: &'static str, terminal: Terminal) -> Result<(), WriterError> {
        self.check(operation, STREAMING)?;
        if self.terminal.is_some() {
            return Err(WriterError::InvalidState {
                operation,
                state: self.state,
            });
        }
        self.terminal = Some(terminal);
        Ok(())
    }

    pub async fn disconnected(&self) {
        self.sink.closed().await;
    }

    /// Close the stream with its terminal frame
    pub async fn close(&mut self, frame: Option<Bytes>) -> Result<(), WriterError> {
        self.check("write_end", STREAMING)?;
        if self.terminal.is_none() {
            return Err(WriterError::InvalidState {
                operation: "write_end",
                state: self.state,
            });
        }
        self.state = WriterState::Finished;
        self.sink.close(frame).await
    }
}

/// `data: <json>\n\n`
pub(crate) fn sse_data<T: Serialize>(payload: &T) -> Result<Bytes, WriterError> {
    let json = serde_json::to_string(payload)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

/// `event: <name>\ndata: <json>\n\n`
pub(crate) fn sse_event<T: Serialize>(event: &str, payload: &T) -> Result<Bytes, WriterError> {
    let json = serde_json::to_string(payload)?;
    Ok(Bytes::from(format!("event: {event}\ndata: {json}\n\n")))
}

/// `<json>\n`
pub(crate) fn ndjson_line<T: Serialize>(payload: &T) -> Result<Bytes, WriterError> {
    let mut line = serde_json::to_vec(payload)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Head for an event stream plus the caller's extra headers
pub(crate) fn stream_headers(content_type: &'static str, extra: &HeaderMap) -> HeaderMap {
    let mut headers = extra.clone();
    headers.insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static(content_type));
    headers.insert(http::header::CACHE_CONTROL, http::HeaderValue::from_static("no-cache"));
    headers
}
