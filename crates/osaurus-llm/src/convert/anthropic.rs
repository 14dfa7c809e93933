//! Conversion between internal types and Anthropic wire format

use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicErrorDetail, AnthropicErrorResponse, AnthropicMessage,
    AnthropicRequest, AnthropicResponse, AnthropicResponseBlock, AnthropicSystem, AnthropicTool, AnthropicToolChoice,
    AnthropicUsage,
};
use crate::types::{
    ChatParams, ChatRequest, Completion, FinishReason, FunctionCall, Message, Role, ToolCall, ToolDefinition,
    ToolInvocation, Usage,
};

// -- Inbound --

impl From<AnthropicRequest> for ChatRequest {
    fn from(req: AnthropicRequest) -> Self {
        let mut messages = Vec::with_capacity(req.messages.len() + 1);

        if let Some(system) = req.system.map(AnthropicSystem::into_text).filter(|s| !s.is_empty()) {
            messages.push(Message::system(system));
        }

        for msg in req.messages {
            push_message(&mut messages, msg);
        }

        Self {
            model: req.model,
            messages,
            params: ChatParams {
                temperature: req.temperature,
                top_p: req.top_p,
                max_tokens: req.max_tokens,
                stop: req.stop_sequences,
            },
            tools: req.tools.unwrap_or_default().into_iter().map(Into::into).collect(),
            tool_choice: req.tool_choice.as_ref().and_then(tool_choice_to_openai),
            stream: req.stream.unwrap_or(false),
        }
    }
}

/// Expand one Anthropic message, which may carry several tool results, into internal messages
fn push_message(out: &mut Vec<Message>, msg: AnthropicMessage) {
    let role = Role::parse(&msg.role);

    let blocks = match msg.content {
        AnthropicContent::Text(text) => {
            out.push(Message::new(role, text));
            return;
        }
        AnthropicContent::Blocks(blocks) => blocks,
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            AnthropicContentBlock::Text { text: part } => text.push_str(&part),
            AnthropicContentBlock::Image { .. } => {}
            AnthropicContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                function: FunctionCall {
                    name,
                    arguments: input.to_string(),
                },
            }),
            AnthropicContentBlock::ToolResult {
                tool_use_id, content, ..
            } => {
                let output = content.map(|c| c.into_text()).unwrap_or_default();
                out.push(Message::tool_result(tool_use_id, output));
            }
        }
    }

    if !text.is_empty() || !tool_calls.is_empty() {
        out.push(Message {
            tool_calls,
            ..Message::new(role, text)
        });
    }
}

impl From<AnthropicTool> for ToolDefinition {
    fn from(tool: AnthropicTool) -> Self {
        Self {
            name: tool.name,
            description: tool.description,
            parameters: tool.input_schema,
        }
    }
}

/// Map Anthropic `tool_choice` onto the `OpenAI` shape the engine understands
fn tool_choice_to_openai(choice: &AnthropicToolChoice) -> Option<serde_json::Value> {
    match choice.choice_type.as_str() {
        "auto" => Some(serde_json::json!("auto")),
        "any" => Some(serde_json::json!("required")),
        "none" => Some(serde_json::json!("none")),
        "tool" => choice.name.as_ref().map(|name| {
            serde_json::json!({
                "type": "function",
                "function": { "name": name },
            })
        }),
        _ => None,
    }
}

// -- Outbound --

impl From<Usage> for AnthropicUsage {
    fn from(usage: Usage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}

/// `message` body for a text answer
pub fn completion_response(model: &str, completion: &Completion) -> AnthropicResponse {
    build_response(
        model,
        vec![AnthropicResponseBlock::Text {
            text: completion.text.clone(),
        }],
        completion.finish_reason,
        completion.usage,
    )
}

/// `message` body with a single `tool_use` block
pub fn tool_use_response(model: &str, invocation: &ToolInvocation, usage: Usage) -> AnthropicResponse {
    build_response(
        model,
        vec![AnthropicResponseBlock::ToolUse {
            id: invocation.call_id("toolu_"),
            name: invocation.name.clone(),
            input: invocation.arguments_value(),
        }],
        FinishReason::ToolCalls,
        usage,
    )
}

fn build_response(
    model: &str,
    content: Vec<AnthropicResponseBlock>,
    finish: FinishReason,
    usage: Usage,
) -> AnthropicResponse {
    AnthropicResponse {
        id: super::response_id("msg_"),
        response_type: "message".to_owned(),
        role: "assistant".to_owned(),
        content,
        model: model.to_owned(),
        stop_reason: Some(finish.anthropic_stop_reason().to_owned()),
        stop_sequence: None,
        usage: usage.into(),
    }
}

/// Anthropic error envelope
pub fn error_response(error_type: &str, message: String) -> AnthropicErrorResponse {
    AnthropicErrorResponse {
        response_type: "error".to_owned(),
        error: AnthropicErrorDetail {
            error_type: error_type.to_owned(),
            message,
        },
    }
}
