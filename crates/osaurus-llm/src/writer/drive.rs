use futures_util::StreamExt;
use http::HeaderMap;

use super::{StreamWriter, Terminal, WriterError};
use crate::chunker::chunk_arguments;
use crate::engine::{EngineEvent, EventStream};
use crate::types::{FinishReason, ToolInvocation};

/// What a completed stream produced, for logging and memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub text: String,
    /// Tool call with the id that was sent to the client
    pub tool_call: Option<ToolInvocation>,
    pub terminal: Terminal,
}

/// Replay `events` through `writer`, in order, until the terminal frame
///
/// A [`WriterError::Disconnected`] ends the replay early, including while the
/// engine is still thinking. `events` is dropped on every exit path, which
/// cancels the engine work behind it.
pub async fn drive(
    writer: &mut dyn StreamWriter,
    mut events: EventStream,
    extra_headers: &HeaderMap,
) -> Result<StreamSummary, WriterError> {
    writer.write_headers(extra_headers).await?;
    writer.write_role_or_start().await?;

    let mut text = String::new();
    let mut tool_call = None;

    let terminal = loop {
        let next = tokio::select! {
            event = events.next() => Some(event),
            () = writer.disconnected() => None,
        };
        let Some(next) = next else {
            tracing::debug!("client went away while waiting on the engine");
            return Err(WriterError::Disconnected);
        };

        let Some(event) = next else {
            writer.write_finish(FinishReason::Stop).await?;
            break Terminal::Finished(FinishReason::Stop);
        };

        match event {
            EngineEvent::Delta(delta) => {
                writer.write_text_delta(&delta).await?;
                text.push_str(&delta);
            }
            EngineEvent::ToolCall(mut invocation) => {
                if invocation.arguments.trim().is_empty() {
                    "{}".clone_into(&mut invocation.arguments);
                }

                let call_id = invocation.call_id(writer.call_id_prefix());
                writer.write_tool_call_start(&call_id, &invocation.name).await?;

                match writer.argument_window() {
                    Some(window) => {
                        for fragment in chunk_arguments(&invocation.arguments, window) {
                            writer.write_tool_call_delta(fragment).await?;
                        }
                    }
                    None => writer.write_tool_call_delta(&invocation.arguments).await?,
                }

                writer.write_tool_call_done().await?;
                writer.write_finish(FinishReason::ToolCalls).await?;

                invocation.id = Some(call_id);
                tool_call = Some(invocation);
                break Terminal::Finished(FinishReason::ToolCalls);
            }
            EngineEvent::Finished(reason) => {
                writer.write_finish(reason).await?;
                break Terminal::Finished(reason);
            }
            EngineEvent::Failed(message) => {
                writer.write_error(&message).await?;
                break Terminal::Failed(message);
            }
        }
    };

    drop(events);
    writer.write_end().await?;

    Ok(StreamSummary {
        text,
        tool_call,
        terminal,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use futures_util::stream;

    use super::*;
    use crate::writer::{OpenAiWriter, channel};

    /// Flips its flag when the engine stream is dropped
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn dropped_body_cancels_a_stalled_engine() {
        let dropped = Arc::new(AtomicBool::new(false));
        let guard = DropFlag(dropped.clone());

        let events: EventStream = stream::iter([EngineEvent::Delta("hi".to_owned())])
            .chain(stream::pending::<EngineEvent>().map(move |event| {
                let _held = &guard;
                event
            }))
            .boxed();

        let (sink, body) = channel();
        let task = tokio::spawn(async move {
            let mut writer = OpenAiWriter::new(Box::new(sink), "m", 1024);
            drive(&mut writer, events, &HeaderMap::new()).await
        });

        let response = body.into_response().await;
        drop(response);

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("drive kept waiting on the engine")
            .unwrap();

        assert!(matches!(result, Err(WriterError::Disconnected)));
        assert!(dropped.load(Ordering::SeqCst));
    }
}
