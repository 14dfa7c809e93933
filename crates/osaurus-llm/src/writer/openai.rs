use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;

use super::{FrameSink, StreamWriter, Terminal, WriterCore, WriterError, WriterState, sse_data, stream_headers};
use crate::protocol::openai::{
    OpenAiStreamChoice, OpenAiStreamChunk, OpenAiStreamDelta, OpenAiStreamFunctionCall, OpenAiStreamToolCall,
    OpenAiUsage,
};
use crate::types::{FinishReason, Usage, estimate_tokens};

/// `chat.completion.chunk` SSE stream ending in `data: [DONE]`
pub struct OpenAiWriter {
    core: WriterCore,
    id: String,
    created: i64,
    model: String,
    window: usize,
    /// Prompt estimate, set when the client asked for `include_usage`
    usage_prompt_tokens: Option<u32>,
    completion_text: String,
}

impl OpenAiWriter {
    pub fn new(sink: Box<dyn FrameSink>, model: impl Into<String>, window: usize) -> Self {
        Self {
            core: WriterCore::new(sink),
            id: crate::convert::response_id("chatcmpl-"),
            created: crate::convert::unix_now(),
            model: model.into(),
            window,
            usage_prompt_tokens: None,
            completion_text: String::new(),
        }
    }

    /// Attach a usage object to the finish chunk
    #[must_use]
    pub const fn with_usage(mut self, prompt_tokens: u32) -> Self {
        self.usage_prompt_tokens = Some(prompt_tokens);
        self
    }

    fn chunk(&self, delta: OpenAiStreamDelta, finish_reason: Option<FinishReason>) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_owned(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![OpenAiStreamChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(|r| r.as_str().to_owned()),
            }],
            usage: None,
        }
    }

    fn tool_chunk(&self, call: OpenAiStreamToolCall) -> OpenAiStreamChunk {
        self.chunk(
            OpenAiStreamDelta {
                tool_calls: Some(vec![call]),
                ..OpenAiStreamDelta::default()
            },
            None,
        )
    }
}

#[async_trait]
impl StreamWriter for OpenAiWriter {
    fn state(&self) -> WriterState {
        self.core.state()
    }

    fn argument_window(&self) -> Option<usize> {
        Some(self.window)
    }

    async fn write_headers(&mut self, extra: &HeaderMap) -> Result<(), WriterError> {
        self.core.send_headers(stream_headers("text/event-stream", extra)).await
    }

    async fn write_role_or_start(&mut self) -> Result<(), WriterError> {
        self.core
            .enter("write_role_or_start", &[WriterState::HeadersSent], WriterState::RoleAnnounced)?;

        let chunk = self.chunk(
            OpenAiStreamDelta {
                role: Some("assistant".to_owned()),
                content: Some(String::new()),
                tool_calls: None,
            },
            None,
        );
        self.core.send("write_role_or_start", sse_data(&chunk)?).await
    }

    async fn write_text_delta(&mut self, text: &str) -> Result<(), WriterError> {
        self.core.enter_content("write_text_delta")?;
        self.completion_text.push_str(text);

        let chunk = self.chunk(
            OpenAiStreamDelta {
                content: Some(text.to_owned()),
                ..OpenAiStreamDelta::default()
            },
            None,
        );
        self.core.send("write_text_delta", sse_data(&chunk)?).await
    }

    async fn write_tool_call_start(&mut self, call_id: &str, name: &str) -> Result<(), WriterError> {
        self.core.enter_tool("write_tool_call_start")?;

        let chunk = self.tool_chunk(OpenAiStreamToolCall {
            index: 0,
            id: Some(call_id.to_owned()),
            tool_type: Some("function".to_owned()),
            function: Some(OpenAiStreamFunctionCall {
                name: Some(name.to_owned()),
                arguments: Some(String::new()),
            }),
        });
        self.core.send("write_tool_call_start", sse_data(&chunk)?).await
    }

    async fn write_tool_call_delta(&mut self, fragment: &str) -> Result<(), WriterError> {
        self.core.expect_tool("write_tool_call_delta")?;
        self.completion_text.push_str(fragment);

        let chunk = self.tool_chunk(OpenAiStreamToolCall {
            index: 0,
            id: None,
            tool_type: None,
            function: Some(OpenAiStreamFunctionCall {
                name: None,
                arguments: Some(fragment.to_owned()),
            }),
        });
        self.core.send("write_tool_call_delta", sse_data(&chunk)?).await
    }

    async fn write_tool_call_done(&mut self) -> Result<(), WriterError> {
        // Arguments end implicitly with the finish chunk
        self.core.expect_tool("write_tool_call_done")
    }

    async fn write_finish(&mut self, reason: FinishReason) -> Result<(), WriterError> {
        let mut chunk = self.chunk(OpenAiStreamDelta::default(), Some(reason));

        if let Some(prompt_tokens) = self.usage_prompt_tokens {
            chunk.usage = Some(OpenAiUsage::from(Usage {
                prompt_tokens,
                completion_tokens: estimate_tokens(&self.completion_text),
            }));
        }

        self.core.send("write_finish", sse_data(&chunk)?).await?;
        self.core.record("write_finish", Terminal::Finished(reason))
    }

    async fn write_error(&mut self, message: &str) -> Result<(), WriterError> {
        let payload = serde_json::json!({
            "error": {
                "message": message,
                "type": "server_error",
                "code": serde_json::Value::Null,
            }
        });

        self.core.send("write_error", sse_data(&payload)?).await?;
        self.core.record("write_error", Terminal::Failed(message.to_owned()))
    }

    async fn disconnected(&self) {
        self.core.disconnected().await;
    }

    async fn write_end(&mut self) -> Result<(), WriterError> {
        self.core.close(Some(Bytes::from_static(b"data: [DONE]\n\n"))).await
    }
}
