use async_trait::async_trait;
use http::HeaderMap;

use super::{FrameSink, StreamWriter, Terminal, WriterCore, WriterError, WriterState, sse_event, stream_headers};
use crate::protocol::anthropic::{
    AnthropicDeltaUsage, AnthropicErrorDetail, AnthropicMessageDelta, AnthropicStreamContentBlock,
    AnthropicStreamDelta, AnthropicStreamEvent, AnthropicStreamMessage, AnthropicUsage,
};
use crate::types::{FinishReason, estimate_tokens};

/// Anthropic Messages SSE stream
///
/// Text goes into one lazily opened `text` block. A tool call closes that
/// block and opens a `tool_use` block at the next index.
pub struct AnthropicWriter {
    core: WriterCore,
    id: String,
    model: String,
    input_tokens: u32,
    window: usize,
    output_text: String,
    /// Index of the currently open content block
    open_block: Option<u32>,
    next_index: u32,
}

impl AnthropicWriter {
    pub fn new(sink: Box<dyn FrameSink>, model: impl Into<String>, input_tokens: u32, window: usize) -> Self {
        Self {
            core: WriterCore::new(sink),
            id: crate::convert::response_id("msg_"),
            model: model.into(),
            input_tokens,
            window,
            output_text: String::new(),
            open_block: None,
            next_index: 0,
        }
    }

    async fn emit(&mut self, operation: &'static str, event: &AnthropicStreamEvent) -> Result<(), WriterError> {
        let frame = sse_event(event.event_name(), event)?;
        self.core.send(operation, frame).await
    }

    async fn start_block(
        &mut self,
        operation: &'static str,
        content_block: AnthropicStreamContentBlock,
    ) -> Result<(), WriterError> {
        let index = self.next_index;
        self.next_index += 1;
        self.open_block = Some(index);
        self.emit(operation, &AnthropicStreamEvent::ContentBlockStart { index, content_block })
            .await
    }

    async fn stop_block(&mut self, operation: &'static str) -> Result<(), WriterError> {
        match self.open_block.take() {
            Some(index) => {
                self.emit(operation, &AnthropicStreamEvent::ContentBlockStop { index })
                    .await
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StreamWriter for AnthropicWriter {
    fn state(&self) -> WriterState {
        self.core.state()
    }

    fn argument_window(&self) -> Option<usize> {
        Some(self.window)
    }

    fn call_id_prefix(&self) -> &'static str {
        "toolu_"
    }

    async fn write_headers(&mut self, extra: &HeaderMap) -> Result<(), WriterError> {
        self.core.send_headers(stream_headers("text/event-stream", extra)).await
    }

    async fn write_role_or_start(&mut self) -> Result<(), WriterError> {
        self.core
            .enter("write_role_or_start", &[WriterState::HeadersSent], WriterState::RoleAnnounced)?;

        let message = AnthropicStreamMessage {
            id: self.id.clone(),
            message_type: "message".to_owned(),
            role: "assistant".to_owned(),
            content: Vec::new(),
            model: self.model.clone(),
            stop_reason: None,
            stop_sequence: None,
            usage: AnthropicUsage {
                input_tokens: self.input_tokens,
                output_tokens: 0,
            },
        };
        self.emit("write_role_or_start", &AnthropicStreamEvent::MessageStart { message })
            .await
    }

    async fn write_text_delta(&mut self, text: &str) -> Result<(), WriterError> {
        self.core.enter_content("write_text_delta")?;
        self.output_text.push_str(text);

        if self.open_block.is_none() {
            self.start_block(
                "write_text_delta",
                AnthropicStreamContentBlock::Text { text: String::new() },
            )
            .await?;
        }

        let index = self.open_block.unwrap_or_default();
        self.emit(
            "write_text_delta",
            &AnthropicStreamEvent::ContentBlockDelta {
                index,
                delta: AnthropicStreamDelta::TextDelta { text: text.to_owned() },
            },
        )
        .await
    }

    async fn write_tool_call_start(&mut self, call_id: &str, name: &str) -> Result<(), WriterError> {
        self.core.enter_tool("write_tool_call_start")?;
        self.stop_block("write_tool_call_start").await?;

        self.start_block(
            "write_tool_call_start",
            AnthropicStreamContentBlock::ToolUse {
                id: call_id.to_owned(),
                name: name.to_owned(),
                input: serde_json::json!({}),
            },
        )
        .await
    }

    async fn write_tool_call_delta(&mut self, fragment: &str) -> Result<(), WriterError> {
        self.core.expect_tool("write_tool_call_delta")?;
        self.output_text.push_str(fragment);

        let index = self.open_block.unwrap_or_default();
        self.emit(
            "write_tool_call_delta",
            &AnthropicStreamEvent::ContentBlockDelta {
                index,
                delta: AnthropicStreamDelta::InputJsonDelta {
                    partial_json: fragment.to_owned(),
                },
            },
        )
        .await
    }

    async fn write_tool_call_done(&mut self) -> Result<(), WriterError> {
        self.core.expect_tool("write_tool_call_done")?;
        self.stop_block("write_tool_call_done").await
    }

    async fn write_finish(&mut self, reason: FinishReason) -> Result<(), WriterError> {
        self.stop_block("write_finish").await?;

        let event = AnthropicStreamEvent::MessageDelta {
            delta: AnthropicMessageDelta {
                stop_reason: Some(reason.anthropic_stop_reason().to_owned()),
                stop_sequence: None,
            },
            usage: AnthropicDeltaUsage {
                output_tokens: estimate_tokens(&self.output_text),
            },
        };
        self.emit("write_finish", &event).await?;
        self.core.record("write_finish", Terminal::Finished(reason))
    }

    async fn write_error(&mut self, message: &str) -> Result<(), WriterError> {
        // The error event itself is the terminal frame
        self.core.record("write_error", Terminal::Failed(message.to_owned()))
    }

    async fn disconnected(&self) {
        self.core.disconnected().await;
    }

    async fn write_end(&mut self) -> Result<(), WriterError> {
        let event = match self.core.terminal() {
            Some(Terminal::Failed(message)) => AnthropicStreamEvent::Error {
                error: AnthropicErrorDetail {
                    error_type: "api_error".to_owned(),
                    message: message.clone(),
                },
            },
            _ => AnthropicStreamEvent::MessageStop,
        };

        let frame = sse_event(event.event_name(), &event)?;
        self.core.close(Some(frame)).await
    }
}
