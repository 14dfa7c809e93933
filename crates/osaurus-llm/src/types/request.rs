use super::message::{Message, Role};
use super::tool::ToolDefinition;

/// Sampling parameters shared by every protocol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatParams {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
}

/// Canonical chat request handed to the engine
///
/// Built once by a protocol handler and never mutated afterwards, except for
/// the memory-context rewrite the engine adapter applies before dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub params: ChatParams,
    pub tools: Vec<ToolDefinition>,
    /// Vendor tool choice, already mapped to the `OpenAI` shape
    pub tool_choice: Option<serde_json::Value>,
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            params: ChatParams::default(),
            tools: Vec::new(),
            tool_choice: None,
            stream: false,
        }
    }

    /// Content of the most recent user turn
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Rough prompt size: `max(1, chars / 4)` per message, system prompt included
    pub fn estimated_input_tokens(&self) -> u32 {
        self.messages
            .iter()
            .map(|m| estimate_tokens(&m.content).max(1))
            .fold(0u32, u32::saturating_add)
    }

    /// Prefix `context` onto the first system message, inserting one if absent
    pub fn prepend_system(&mut self, context: &str) {
        match self.messages.iter_mut().find(|m| m.role == Role::System) {
            Some(system) if system.content.is_empty() => context.clone_into(&mut system.content),
            Some(system) => system.content = format!("{context}\n\n{}", system.content),
            None => self.messages.insert(0, Message::system(context)),
        }
    }
}

/// Character-count token estimate (`chars / 4`)
pub fn estimate_tokens(text: &str) -> u32 {
    u32::try_from(text.chars().count() / 4).unwrap_or(u32::MAX)
}
