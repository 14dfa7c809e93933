//! Conversion between internal types and Ollama wire format

use crate::engine::ModelInfo;
use crate::protocol::ollama::{
    OllamaChatChunk, OllamaChatRequest, OllamaFunctionCall, OllamaMessage, OllamaModelDetails, OllamaShowResponse,
    OllamaTag, OllamaToolCall,
};
use crate::types::{ChatParams, ChatRequest, Completion, FunctionCall, Message, Role, ToolCall, ToolInvocation, Usage};

// -- Inbound --

impl From<OllamaChatRequest> for ChatRequest {
    fn from(req: OllamaChatRequest) -> Self {
        let options = req.options.unwrap_or_default();

        Self {
            model: req.model,
            messages: req.messages.into_iter().map(Into::into).collect(),
            params: ChatParams {
                temperature: options.temperature,
                top_p: options.top_p,
                max_tokens: options.num_predict,
                stop: options.stop,
            },
            tools: req.tools.unwrap_or_default().into_iter().map(Into::into).collect(),
            tool_choice: None,
            stream: req.stream.unwrap_or(true),
        }
    }
}

impl From<OllamaMessage> for Message {
    fn from(msg: OllamaMessage) -> Self {
        let tool_calls = msg
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, call)| ToolCall {
                id: format!("call_{index}"),
                function: FunctionCall {
                    name: call.function.name,
                    arguments: call.function.arguments.to_string(),
                },
            })
            .collect();

        Self {
            tool_calls,
            ..Self::new(Role::parse(&msg.role), msg.content)
        }
    }
}

// -- Outbound --

/// RFC 3339 timestamp in the form Ollama clients expect
pub fn created_at() -> String {
    jiff::Timestamp::now().to_string()
}

/// Assistant message carrying one tool call with object arguments
pub fn tool_call_message(invocation: &ToolInvocation) -> OllamaMessage {
    OllamaMessage {
        role: "assistant".to_owned(),
        content: String::new(),
        tool_calls: Some(vec![OllamaToolCall {
            function: OllamaFunctionCall {
                name: invocation.name.clone(),
                arguments: invocation.arguments_value(),
            },
        }]),
    }
}

pub fn text_message(content: String) -> OllamaMessage {
    OllamaMessage {
        role: "assistant".to_owned(),
        content,
        tool_calls: None,
    }
}

/// Final `done: true` object for a non-streaming `/chat`
pub fn completion_response(model: &str, completion: &Completion) -> OllamaChatChunk {
    done_chunk(
        model,
        text_message(completion.text.clone()),
        completion.finish_reason.as_str(),
        completion.usage,
    )
}

pub fn tool_call_response(model: &str, invocation: &ToolInvocation, usage: Usage) -> OllamaChatChunk {
    done_chunk(model, tool_call_message(invocation), "stop", usage)
}

fn done_chunk(model: &str, message: OllamaMessage, reason: &str, usage: Usage) -> OllamaChatChunk {
    OllamaChatChunk {
        id: String::new(),
        model: model.to_owned(),
        created_at: created_at(),
        message,
        done: true,
        done_reason: Some(reason.to_owned()),
        prompt_eval_count: Some(usage.prompt_tokens),
        eval_count: Some(usage.completion_tokens),
        error: None,
    }
}

impl From<&ModelInfo> for OllamaModelDetails {
    fn from(model: &ModelInfo) -> Self {
        Self {
            format: "gguf".to_owned(),
            family: model.family(),
            parameter_size: model.parameter_size.clone().unwrap_or_default(),
            quantization_level: model.quantization_level.clone().unwrap_or_default(),
        }
    }
}

impl From<&ModelInfo> for OllamaTag {
    fn from(model: &ModelInfo) -> Self {
        Self {
            name: model.id.clone(),
            model: model.id.clone(),
            modified_at: created_at(),
            size: 0,
            digest: String::new(),
            details: model.into(),
        }
    }
}

/// `/show` body for a known model
pub fn show_response(model: &ModelInfo) -> OllamaShowResponse {
    let mut model_info = serde_json::Map::new();
    model_info.insert("general.architecture".to_owned(), serde_json::Value::String(model.family()));

    OllamaShowResponse {
        modelfile: String::new(),
        parameters: String::new(),
        template: String::new(),
        details: model.into(),
        model_info,
        capabilities: vec!["completion".to_owned(), "tools".to_owned()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_defaults_to_streaming() {
        let wire: OllamaChatRequest = serde_json::from_value(serde_json::json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "options": {"num_predict": 16}
        }))
        .unwrap();

        let request = ChatRequest::from(wire);
        assert!(request.stream);
        assert_eq!(request.params.max_tokens, Some(16));
    }

    #[test]
    fn history_tool_calls_serialize_arguments() {
        let msg: OllamaMessage = serde_json::from_value(serde_json::json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [{"function": {"name": "get_weather", "arguments": {"city": "Paris"}}}]
        }))
        .unwrap();

        let msg = Message::from(msg);
        assert_eq!(msg.tool_calls[0].function.arguments, r#"{"city":"Paris"}"#);
    }

    #[test]
    fn final_object_has_empty_id() {
        let completion = Completion {
            text: "hi".to_owned(),
            usage: Usage::default(),
            finish_reason: crate::types::FinishReason::Stop,
        };

        let body = serde_json::to_value(completion_response("m", &completion)).unwrap();
        assert_eq!(body["id"], "");
        assert_eq!(body["done"], true);
    }

    #[test]
    fn show_lists_architecture() {
        let body = serde_json::to_value(show_response(&ModelInfo::new("llama-3.2-3b"))).unwrap();
        assert_eq!(body["model_info"]["general.architecture"], "llama");
        assert_eq!(body["capabilities"][1], "tools");
    }
}
