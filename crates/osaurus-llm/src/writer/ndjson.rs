use async_trait::async_trait;
use http::HeaderMap;

use super::{FrameSink, StreamWriter, Terminal, WriterCore, WriterError, WriterState, ndjson_line, stream_headers};
use crate::convert::ollama::{created_at, text_message, tool_call_message};
use crate::protocol::ollama::{OllamaChatChunk, OllamaMessage};
use crate::types::{FinishReason, ToolInvocation, estimate_tokens};

/// Ollama-style NDJSON stream: one object per line, the last with `done: true`
///
/// There is no start frame and no correlation id. Tool arguments are sent
/// whole, as a parsed object, on a single line.
pub struct NdjsonWriter {
    core: WriterCore,
    model: String,
    prompt_tokens: u32,
    completion_text: String,
    call: Option<ToolInvocation>,
}

impl NdjsonWriter {
    pub fn new(sink: Box<dyn FrameSink>, model: impl Into<String>, prompt_tokens: u32) -> Self {
        Self {
            core: WriterCore::new(sink),
            model: model.into(),
            prompt_tokens,
            completion_text: String::new(),
            call: None,
        }
    }

    fn line(&self, message: OllamaMessage) -> OllamaChatChunk {
        OllamaChatChunk {
            id: String::new(),
            model: self.model.clone(),
            created_at: created_at(),
            message,
            done: false,
            done_reason: None,
            prompt_eval_count: None,
            eval_count: None,
            error: None,
        }
    }
}

#[async_trait]
impl StreamWriter for NdjsonWriter {
    fn state(&self) -> WriterState {
        self.core.state()
    }

    fn argument_window(&self) -> Option<usize> {
        None
    }

    async fn write_headers(&mut self, extra: &HeaderMap) -> Result<(), WriterError> {
        self.core
            .send_headers(stream_headers("application/x-ndjson", extra))
            .await
    }

    async fn write_role_or_start(&mut self) -> Result<(), WriterError> {
        self.core
            .enter("write_role_or_start", &[WriterState::HeadersSent], WriterState::RoleAnnounced)
    }

    async fn write_text_delta(&mut self, text: &str) -> Result<(), WriterError> {
        self.core.enter_content("write_text_delta")?;
        self.completion_text.push_str(text);

        let line = self.line(text_message(text.to_owned()));
        self.core.send("write_text_delta", ndjson_line(&line)?).await
    }

    async fn write_tool_call_start(&mut self, call_id: &str, name: &str) -> Result<(), WriterError> {
        self.core.enter_tool("write_tool_call_start")?;

        let mut call = ToolInvocation::new(name, String::new());
        call.id = Some(call_id.to_owned());
        self.call = Some(call);
        Ok(())
    }

    async fn write_tool_call_delta(&mut self, fragment: &str) -> Result<(), WriterError> {
        self.core.expect_tool("write_tool_call_delta")?;

        if let Some(call) = self.call.as_mut() {
            call.arguments.push_str(fragment);
        }
        Ok(())
    }

    async fn write_tool_call_done(&mut self) -> Result<(), WriterError> {
        self.core.expect_tool("write_tool_call_done")?;

        let Some(call) = self.call.take() else {
            return Ok(());
        };
        self.completion_text.push_str(&call.arguments);

        let line = self.line(tool_call_message(&call));
        self.core.send("write_tool_call_done", ndjson_line(&line)?).await
    }

    async fn write_finish(&mut self, reason: FinishReason) -> Result<(), WriterError> {
        self.core.record("write_finish", Terminal::Finished(reason))
    }

    async fn write_error(&mut self, message: &str) -> Result<(), WriterError> {
        self.core.record("write_error", Terminal::Failed(message.to_owned()))
    }

    async fn disconnected(&self) {
        self.core.disconnected().await;
    }

    async fn write_end(&mut self) -> Result<(), WriterError> {
        let mut line = self.line(text_message(String::new()));
        line.done = true;
        line.prompt_eval_count = Some(self.prompt_tokens);
        line.eval_count = Some(estimate_tokens(&self.completion_text));

        match self.core.terminal() {
            // Ollama reports tool calls with a plain `stop`
            Some(Terminal::Finished(FinishReason::ToolCalls)) => line.done_reason = Some("stop".to_owned()),
            Some(Terminal::Finished(reason)) => line.done_reason = Some(reason.as_str().to_owned()),
            Some(Terminal::Failed(message)) => {
                line.done_reason = Some(FinishReason::Error.as_str().to_owned());
                line.error = Some(message.clone());
            }
            None => {}
        }

        let frame = ndjson_line(&line)?;
        self.core.close(Some(frame)).await
    }
}
