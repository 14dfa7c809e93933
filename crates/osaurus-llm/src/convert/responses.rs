//! Conversion between internal types and the Open Responses format

use crate::protocol::responses::{
    ResponsesInput, ResponsesInputContent, ResponsesInputItem, ResponsesObject, ResponsesOutputContent,
    ResponsesOutputItem, ResponsesRequest, ResponsesTool, ResponsesUsage,
};
use crate::types::{
    ChatParams, ChatRequest, Completion, FunctionCall, Message, Role, ToolCall, ToolDefinition, ToolInvocation, Usage,
};

// -- Inbound --

impl From<ResponsesRequest> for ChatRequest {
    fn from(req: ResponsesRequest) -> Self {
        let mut messages = Vec::new();

        if let Some(instructions) = req.instructions.filter(|s| !s.is_empty()) {
            messages.push(Message::system(instructions));
        }

        match req.input {
            ResponsesInput::Text(text) => messages.push(Message::user(text)),
            ResponsesInput::Items(items) => {
                for item in items {
                    push_item(&mut messages, item);
                }
            }
        }

        Self {
            model: req.model,
            messages,
            params: ChatParams {
                temperature: req.temperature,
                top_p: req.top_p,
                max_tokens: req.max_output_tokens,
                stop: None,
            },
            tools: req.tools.unwrap_or_default().into_iter().filter_map(tool_definition).collect(),
            tool_choice: req.tool_choice,
            stream: req.stream.unwrap_or(false),
        }
    }
}

fn push_item(out: &mut Vec<Message>, item: ResponsesInputItem) {
    match item {
        ResponsesInputItem::Message { role, content } => {
            out.push(Message::new(Role::parse(&role), ResponsesInputContent::into_text(content)));
        }
        ResponsesInputItem::FunctionCall {
            call_id,
            name,
            arguments,
        } => {
            let call = ToolCall {
                id: call_id,
                function: FunctionCall { name, arguments },
            };

            // Consecutive calls belong to the same assistant turn
            match out.last_mut() {
                Some(last) if last.role == Role::Assistant && last.content.is_empty() => last.tool_calls.push(call),
                _ => out.push(Message {
                    tool_calls: vec![call],
                    ..Message::assistant("")
                }),
            }
        }
        ResponsesInputItem::FunctionCallOutput { call_id, output } => {
            out.push(Message::tool_result(call_id, output));
        }
    }
}

/// Function tools only; hosted tools such as `web_search` have no name and are skipped
fn tool_definition(tool: ResponsesTool) -> Option<ToolDefinition> {
    if let Some(function) = tool.function {
        return Some(ToolDefinition {
            name: function.name,
            description: function.description,
            parameters: function.parameters,
        });
    }

    Some(ToolDefinition {
        name: tool.name?,
        description: tool.description,
        parameters: tool.parameters,
    })
}

// -- Outbound --

impl From<Usage> for ResponsesUsage {
    fn from(usage: Usage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total(),
        }
    }
}

/// Assistant message item holding `text`
pub fn message_item(id: String, status: &str, text: String) -> ResponsesOutputItem {
    ResponsesOutputItem::Message {
        id,
        status: status.to_owned(),
        role: "assistant".to_owned(),
        content: vec![ResponsesOutputContent::text(text)],
    }
}

/// Function-call item for `invocation`
pub fn function_call_item(
    id: String,
    call_id: String,
    status: &str,
    invocation: &ToolInvocation,
) -> ResponsesOutputItem {
    ResponsesOutputItem::FunctionCall {
        id,
        status: status.to_owned(),
        call_id,
        name: invocation.name.clone(),
        arguments: invocation.arguments.clone(),
    }
}

/// Response object shell shared by streaming and non-streaming paths
pub fn response_object(id: &str, created_at: i64, model: &str, status: &str) -> ResponsesObject {
    ResponsesObject {
        id: id.to_owned(),
        object: "response".to_owned(),
        created_at,
        status: status.to_owned(),
        model: model.to_owned(),
        output: Vec::new(),
        usage: None,
        error: None,
    }
}

/// Completed response holding one message item
pub fn completion_response(model: &str, completion: &Completion) -> ResponsesObject {
    let mut response = response_object(&super::response_id("resp_"), super::unix_now(), model, "completed");
    response.output.push(message_item(
        super::response_id("msg_"),
        "completed",
        completion.text.clone(),
    ));
    response.usage = Some(completion.usage.into());
    response
}

/// Completed response holding one function-call item
pub fn function_call_response(model: &str, invocation: &ToolInvocation, usage: Usage) -> ResponsesObject {
    let mut response = response_object(&super::response_id("resp_"), super::unix_now(), model, "completed");
    response.output.push(function_call_item(
        super::response_id("fc_"),
        invocation.call_id("call_"),
        "completed",
        invocation,
    ));
    response.usage = Some(usage.into());
    response
}
