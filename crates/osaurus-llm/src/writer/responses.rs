use async_trait::async_trait;
use http::HeaderMap;

use super::{FrameSink, StreamWriter, Terminal, WriterCore, WriterError, WriterState, sse_event, stream_headers};
use crate::convert::responses::{message_item, response_object};
use crate::protocol::responses::{
    ResponsesError, ResponsesObject, ResponsesOutputContent, ResponsesOutputItem, ResponsesStreamEvent,
    ResponsesStreamFrame, ResponsesUsage,
};
use crate::types::{FinishReason, estimate_tokens};

struct OpenMessage {
    item_id: String,
    output_index: u32,
    text: String,
}

struct OpenCall {
    item_id: String,
    output_index: u32,
    call_id: String,
    name: String,
    arguments: String,
}

/// Open Responses SSE stream
///
/// Every event carries a `sequence_number`. Finished output items are kept so
/// the terminal `response.completed` (or `response.failed`) can repeat them.
pub struct ResponsesWriter {
    core: WriterCore,
    id: String,
    created_at: i64,
    model: String,
    input_tokens: u32,
    window: usize,
    sequence: u64,
    output: Vec<ResponsesOutputItem>,
    output_tokens: u32,
    message: Option<OpenMessage>,
    call: Option<OpenCall>,
}

impl ResponsesWriter {
    pub fn new(sink: Box<dyn FrameSink>, model: impl Into<String>, input_tokens: u32, window: usize) -> Self {
        Self {
            core: WriterCore::new(sink),
            id: crate::convert::response_id("resp_"),
            created_at: crate::convert::unix_now(),
            model: model.into(),
            input_tokens,
            window,
            sequence: 0,
            output: Vec::new(),
            output_tokens: 0,
            message: None,
            call: None,
        }
    }

    fn frame(&mut self, event: &ResponsesStreamEvent) -> Result<bytes::Bytes, WriterError> {
        let frame = sse_event(
            event.event_name(),
            &ResponsesStreamFrame {
                event,
                sequence_number: self.sequence,
            },
        )?;
        self.sequence += 1;
        Ok(frame)
    }

    async fn emit(&mut self, operation: &'static str, event: &ResponsesStreamEvent) -> Result<(), WriterError> {
        let frame = self.frame(event)?;
        self.core.send(operation, frame).await
    }

    fn snapshot(&self, status: &str) -> ResponsesObject {
        let mut response = response_object(&self.id, self.created_at, &self.model, status);
        response.output.clone_from(&self.output);
        response.usage = Some(ResponsesUsage {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            total_tokens: self.input_tokens + self.output_tokens,
        });
        response
    }

    fn next_output_index(&self) -> u32 {
        u32::try_from(self.output.len()).unwrap_or(u32::MAX)
    }

    /// `output_text.done`, `content_part.done` and `output_item.done` for the open message
    async fn close_message(&mut self, operation: &'static str) -> Result<(), WriterError> {
        let Some(message) = self.message.take() else {
            return Ok(());
        };
        self.output_tokens += estimate_tokens(&message.text);

        self.emit(
            operation,
            &ResponsesStreamEvent::OutputTextDone {
                item_id: message.item_id.clone(),
                output_index: message.output_index,
                content_index: 0,
                text: message.text.clone(),
            },
        )
        .await?;
        self.emit(
            operation,
            &ResponsesStreamEvent::ContentPartDone {
                item_id: message.item_id.clone(),
                output_index: message.output_index,
                content_index: 0,
                part: ResponsesOutputContent::text(message.text.clone()),
            },
        )
        .await?;

        let item = message_item(message.item_id, "completed", message.text);
        self.emit(
            operation,
            &ResponsesStreamEvent::OutputItemDone {
                output_index: message.output_index,
                item: item.clone(),
            },
        )
        .await?;
        self.output.push(item);
        Ok(())
    }
}

#[async_trait]
impl StreamWriter for ResponsesWriter {
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
        const OP: &str = "write_role_or_start";
        self.core
            .enter(OP, &[WriterState::HeadersSent], WriterState::RoleAnnounced)?;

        let response = self.snapshot("in_progress");
        self.emit(OP, &ResponsesStreamEvent::Created { response: response.clone() })
            .await?;
        self.emit(OP, &ResponsesStreamEvent::InProgress { response })
            .await?;

        let message = OpenMessage {
            item_id: crate::convert::response_id("msg_"),
            output_index: self.next_output_index(),
            text: String::new(),
        };
        let item = ResponsesOutputItem::Message {
            id: message.item_id.clone(),
            status: "in_progress".to_owned(),
            role: "assistant".to_owned(),
            content: Vec::new(),
        };
        self.emit(
            OP,
            &ResponsesStreamEvent::OutputItemAdded {
                output_index: message.output_index,
                item,
            },
        )
        .await?;
        self.emit(
            OP,
            &ResponsesStreamEvent::ContentPartAdded {
                item_id: message.item_id.clone(),
                output_index: message.output_index,
                content_index: 0,
                part: ResponsesOutputContent::text(String::new()),
            },
        )
        .await?;

        self.message = Some(message);
        Ok(())
    }

    async fn write_text_delta(&mut self, text: &str) -> Result<(), WriterError> {
        self.core.enter_content("write_text_delta")?;

        let Some(message) = self.message.as_mut() else {
            return Err(WriterError::InvalidState {
                operation: "write_text_delta",
                state: self.core.state(),
            });
        };
        message.text.push_str(text);

        let event = ResponsesStreamEvent::OutputTextDelta {
            item_id: message.item_id.clone(),
            output_index: message.output_index,
            content_index: 0,
            delta: text.to_owned(),
        };
        self.emit("write_text_delta", &event).await
    }

    async fn write_tool_call_start(&mut self, call_id: &str, name: &str) -> Result<(), WriterError> {
        const OP: &str = "write_tool_call_start";
        self.core.enter_tool(OP)?;
        self.close_message(OP).await?;

        let call = OpenCall {
            item_id: crate::convert::response_id("fc_"),
            output_index: self.next_output_index(),
            call_id: call_id.to_owned(),
            name: name.to_owned(),
            arguments: String::new(),
        };
        let item = ResponsesOutputItem::FunctionCall {
            id: call.item_id.clone(),
            status: "in_progress".to_owned(),
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            arguments: String::new(),
        };
        self.emit(
            OP,
            &ResponsesStreamEvent::OutputItemAdded {
                output_index: call.output_index,
                item,
            },
        )
        .await?;

        self.call = Some(call);
        Ok(())
    }

    async fn write_tool_call_delta(&mut self, fragment: &str) -> Result<(), WriterError> {
        self.core.expect_tool("write_tool_call_delta")?;

        let Some(call) = self.call.as_mut() else {
            return Err(WriterError::InvalidState {
                operation: "write_tool_call_delta",
                state: self.core.state(),
            });
        };
        call.arguments.push_str(fragment);

        let event = ResponsesStreamEvent::FunctionCallArgumentsDelta {
            item_id: call.item_id.clone(),
            output_index: call.output_index,
            delta: fragment.to_owned(),
        };
        self.emit("write_tool_call_delta", &event).await
    }

    async fn write_tool_call_done(&mut self) -> Result<(), WriterError> {
        const OP: &str = "write_tool_call_done";
        self.core.expect_tool(OP)?;

        let Some(call) = self.call.take() else {
            return Err(WriterError::InvalidState {
                operation: OP,
                state: self.core.state(),
            });
        };
        self.output_tokens += estimate_tokens(&call.arguments);

        self.emit(
            OP,
            &ResponsesStreamEvent::FunctionCallArgumentsDone {
                item_id: call.item_id.clone(),
                output_index: call.output_index,
                arguments: call.arguments.clone(),
            },
        )
        .await?;

        let item = ResponsesOutputItem::FunctionCall {
            id: call.item_id,
            status: "completed".to_owned(),
            call_id: call.call_id,
            name: call.name,
            arguments: call.arguments,
        };
        self.emit(
            OP,
            &ResponsesStreamEvent::OutputItemDone {
                output_index: call.output_index,
                item: item.clone(),
            },
        )
        .await?;
        self.output.push(item);
        Ok(())
    }

    async fn write_finish(&mut self, reason: FinishReason) -> Result<(), WriterError> {
        self.close_message("write_finish").await?;
        self.core.record("write_finish", Terminal::Finished(reason))
    }

    async fn write_error(&mut self, message: &str) -> Result<(), WriterError> {
        self.core.record("write_error", Terminal::Failed(message.to_owned()))
    }

    async fn disconnected(&self) {
        self.core.disconnected().await;
    }

    async fn write_end(&mut self) -> Result<(), WriterError> {
        let event = match self.core.terminal() {
            Some(Terminal::Failed(message)) => {
                let mut response = self.snapshot("failed");
                response.error = Some(ResponsesError {
                    code: "server_error".to_owned(),
                    message: message.clone(),
                });
                ResponsesStreamEvent::Failed { response }
            }
            _ => ResponsesStreamEvent::Completed {
                response: self.snapshot("completed"),
            },
        };

        let frame = self.frame(&event)?;
        self.core.close(Some(frame)).await
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use futures_util::stream;

    use super::*;
    use crate::engine::EngineEvent;
    use crate::types::ToolInvocation;
    use crate::writer::drive;
    use crate::writer::testing::StrictSink;

    async fn run(events: Vec<EngineEvent>) -> StrictSink {
        let sink = StrictSink::default();
        let mut writer = ResponsesWriter::new(sink.boxed(), "m", 7, 4);
        drive(&mut writer, stream::iter(events).boxed(), &HeaderMap::new())
            .await
            .unwrap();
        sink
    }

    #[tokio::test]
    async fn text_lifecycle() {
        let sink = run(vec![
            EngineEvent::Delta("Hel".to_owned()),
            EngineEvent::Delta("lo".to_owned()),
            EngineEvent::Finished(FinishReason::Stop),
        ])
        .await;

        let recorded = sink.snapshot();
        assert_eq!(
            recorded.sse_events(),
            [
                "response.created",
                "response.in_progress",
                "response.output_item.added",
                "response.content_part.added",
                "response.output_text.delta",
                "response.output_text.delta",
                "response.output_text.done",
                "response.content_part.done",
                "response.output_item.done",
                "response.completed",
            ]
        );
        assert_eq!(recorded.terminal_frames, 1);

        let payloads = recorded.sse_payloads();
        for (expected, payload) in payloads.iter().enumerate() {
            assert_eq!(payload["sequence_number"], expected);
        }
        assert_eq!(payloads[0]["response"]["usage"]["input_tokens"], 7);

        let completed = &payloads.last().unwrap()["response"];
        assert_eq!(completed["status"], "completed");
        assert_eq!(completed["output"][0]["content"][0]["text"], "Hello");
    }

    #[tokio::test]
    async fn tool_call_closes_message_first() {
        let arguments = r#"{"q":"rust"}"#;
        let sink = run(vec![EngineEvent::ToolCall(ToolInvocation::new("search", arguments))]).await;

        let recorded = sink.snapshot();
        let events = recorded.sse_events();
        let tail: Vec<&str> = events[4..].iter().map(String::as_str).collect();
        assert_eq!(
            tail[..4],
            [
                "response.output_text.done",
                "response.content_part.done",
                "response.output_item.done",
                "response.output_item.added",
            ]
        );
        assert_eq!(
            tail[tail.len() - 3..],
            [
                "response.function_call_arguments.done",
                "response.output_item.done",
                "response.completed",
            ]
        );

        let payloads = recorded.sse_payloads();
        let replayed: String = payloads
            .iter()
            .filter(|p| p["type"] == "response.function_call_arguments.delta")
            .map(|p| p["delta"].as_str().unwrap())
            .collect();
        assert_eq!(replayed, arguments);

        let output = &payloads.last().unwrap()["response"]["output"];
        assert_eq!(output[1]["type"], "function_call");
        assert_eq!(output[1]["name"], "search");
        assert_eq!(output[1]["arguments"], arguments);
    }

    #[tokio::test]
    async fn failure_ends_with_response_failed() {
        let sink = run(vec![
            EngineEvent::Delta("x".to_owned()),
            EngineEvent::Failed("boom".to_owned()),
        ])
        .await;

        let recorded = sink.snapshot();
        assert_eq!(recorded.sse_events().last().unwrap(), "response.failed");
        assert_eq!(recorded.terminal_frames, 1);

        let payloads = recorded.sse_payloads();
        let failed = &payloads.last().unwrap()["response"];
        assert_eq!(failed["status"], "failed");
        assert_eq!(failed["error"]["message"], "boom");
    }
}
