//! Conversion between internal types and `OpenAI` wire format

use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiContent, OpenAiFunction, OpenAiFunctionCall, OpenAiMessage,
    OpenAiRequest, OpenAiResponse, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::types::{
    ChatParams, ChatRequest, Completion, FinishReason, FunctionCall, Message, Role, ToolCall, ToolDefinition,
    ToolInvocation, Usage,
};

// -- Inbound --

impl From<OpenAiRequest> for ChatRequest {
    fn from(req: OpenAiRequest) -> Self {
        Self {
            model: req.model,
            messages: req.messages.into_iter().map(Into::into).collect(),
            params: ChatParams {
                temperature: req.temperature,
                top_p: req.top_p,
                max_tokens: req.max_completion_tokens.or(req.max_tokens),
                stop: req.stop.map(Into::into),
            },
            tools: req.tools.unwrap_or_default().into_iter().map(Into::into).collect(),
            tool_choice: req.tool_choice,
            stream: req.stream.unwrap_or(false),
        }
    }
}

impl From<OpenAiMessage> for Message {
    fn from(msg: OpenAiMessage) -> Self {
        Self {
            role: Role::parse(&msg.role),
            content: msg.content.map(OpenAiContent::into_text).unwrap_or_default(),
            tool_calls: msg
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc.id,
                    function: FunctionCall {
                        name: tc.function.name,
                        arguments: tc.function.arguments,
                    },
                })
                .collect(),
            tool_call_id: msg.tool_call_id,
        }
    }
}

impl From<OpenAiTool> for ToolDefinition {
    fn from(tool: OpenAiTool) -> Self {
        Self {
            name: tool.function.name,
            description: tool.function.description,
            parameters: tool.function.parameters,
        }
    }
}

// -- Outbound: internal request -> upstream engine --

impl From<&ChatRequest> for OpenAiRequest {
    fn from(req: &ChatRequest) -> Self {
        Self {
            model: req.model.clone(),
            messages: req.messages.iter().map(Into::into).collect(),
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            max_tokens: req.params.max_tokens,
            max_completion_tokens: None,
            stop: req.params.stop.clone().map(crate::protocol::StopSequences::Many),
            stream: req.stream.then_some(true),
            stream_options: None,
            tools: (!req.tools.is_empty()).then(|| req.tools.iter().map(Into::into).collect()),
            tool_choice: req.tool_choice.clone(),
        }
    }
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        let tool_calls = (!msg.tool_calls.is_empty()).then(|| {
            msg.tool_calls
                .iter()
                .map(|tc| OpenAiToolCall {
                    id: tc.id.clone(),
                    tool_type: "function".to_owned(),
                    function: OpenAiFunctionCall {
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    },
                })
                .collect()
        });

        Self {
            role: msg.role.as_str().to_owned(),
            content: Some(OpenAiContent::Text(msg.content.clone())),
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

impl From<&ToolDefinition> for OpenAiTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            tool_type: "function".to_owned(),
            function: OpenAiFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        }
    }
}

impl From<Usage> for OpenAiUsage {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total(),
        }
    }
}

// -- Outbound: non-streaming bodies --

/// `chat.completion` body for a text answer
pub fn completion_response(model: &str, completion: &Completion) -> OpenAiResponse {
    build_response(
        model,
        OpenAiChoiceMessage {
            role: "assistant".to_owned(),
            content: Some(completion.text.clone()),
            tool_calls: None,
        },
        completion.finish_reason,
        completion.usage,
    )
}

/// `chat.completion` body carrying a single tool call
pub fn tool_call_response(model: &str, invocation: &ToolInvocation, usage: Usage) -> OpenAiResponse {
    let call = OpenAiToolCall {
        id: invocation.call_id("call_"),
        tool_type: "function".to_owned(),
        function: OpenAiFunctionCall {
            name: invocation.name.clone(),
            arguments: invocation.arguments.clone(),
        },
    };

    build_response(
        model,
        OpenAiChoiceMessage {
            role: "assistant".to_owned(),
            content: None,
            tool_calls: Some(vec![call]),
        },
        FinishReason::ToolCalls,
        usage,
    )
}

fn build_response(model: &str, message: OpenAiChoiceMessage, finish: FinishReason, usage: Usage) -> OpenAiResponse {
    OpenAiResponse {
        id: super::response_id("chatcmpl-"),
        object: "chat.completion".to_owned(),
        created: super::unix_now(),
        model: model.to_owned(),
        choices: vec![OpenAiChoice {
            index: 0,
            message,
            finish_reason: Some(finish.as_str().to_owned()),
        }],
        usage: Some(usage.into()),
    }
}

/// Interpret an upstream `chat.completion` body
///
/// The first choice wins. A tool call, if present, takes precedence over text.
pub fn interpret_upstream(response: OpenAiResponse) -> Result<Completion, ToolInvocation> {
    let usage = response
        .usage
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    let Some(choice) = response.choices.into_iter().next() else {
        return Ok(Completion {
            text: String::new(),
            usage,
            finish_reason: FinishReason::Stop,
        });
    };

    if let Some(call) = choice.message.tool_calls.and_then(|calls| calls.into_iter().next()) {
        return Err(ToolInvocation {
            id: Some(call.id).filter(|id| !id.is_empty()),
            name: call.function.name,
            arguments: call.function.arguments,
        });
    }

    Ok(Completion {
        text: choice.message.content.unwrap_or_default(),
        usage,
        finish_reason: choice
            .finish_reason
            .as_deref()
            .map_or(FinishReason::Stop, FinishReason::from_wire),
    })
}
