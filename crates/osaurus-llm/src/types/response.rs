use serde::{Deserialize, Serialize};

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the token budget
    Length,
    /// Model asked for a tool instead of answering
    ToolCalls,
    /// Generation failed
    Error,
}

impl FinishReason {
    /// `OpenAI` and Ollama spelling
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::Error => "error",
        }
    }

    /// Anthropic `stop_reason`
    pub const fn anthropic_stop_reason(self) -> &'static str {
        match self {
            Self::Stop | Self::Error => "end_turn",
            Self::Length => "max_tokens",
            Self::ToolCalls => "tool_use",
        }
    }

    /// Map an upstream `finish_reason` string, treating unknown values as a stop
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "length" | "max_tokens" => Self::Length,
            "tool_calls" | "tool_use" | "function_call" => Self::ToolCalls,
            "error" => Self::Error,
            _ => Self::Stop,
        }
    }
}

/// Token usage for one completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Usage {
    pub const fn total(self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// A finished non-streaming answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
    pub finish_reason: FinishReason,
}
