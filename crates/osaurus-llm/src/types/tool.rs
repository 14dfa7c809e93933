/// A function the client offers to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema of the arguments
    pub parameters: Option<serde_json::Value>,
}

/// The engine's request to run a tool instead of answering with text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Call id chosen by the engine, if it picked one
    pub id: Option<String>,
    pub name: String,
    /// Complete JSON-encoded arguments
    pub arguments: String,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// The engine's id, or a fresh one with the protocol's `prefix`
    pub fn call_id(&self, prefix: &str) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{prefix}{}", uuid::Uuid::new_v4().simple()))
    }

    /// Arguments as a JSON value for protocols that embed an object
    ///
    /// Unparseable arguments become an empty object rather than failing the
    /// response; the raw string is still available in `arguments`.
    pub fn arguments_value(&self) -> serde_json::Value {
        if self.arguments.trim().is_empty() {
            return serde_json::Value::Object(serde_json::Map::new());
        }

        serde_json::from_str(&self.arguments).unwrap_or_else(|e| {
            tracing::debug!(tool = %self.name, error = %e, "tool arguments are not valid JSON");
            serde_json::Value::Object(serde_json::Map::new())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_id_prefers_engine_id() {
        let mut invocation = ToolInvocation::new("get_weather", "{}");
        assert!(invocation.call_id("call_").starts_with("call_"));

        invocation.id = Some("abc".to_owned());
        assert_eq!(invocation.call_id("call_"), "abc");
    }

    #[test]
    fn arguments_value_tolerates_garbage() {
        let invocation = ToolInvocation::new("f", "{not json");
        assert_eq!(invocation.arguments_value(), serde_json::json!({}));

        let invocation = ToolInvocation::new("f", r#"{"city":"Paris"}"#);
        assert_eq!(invocation.arguments_value()["city"], "Paris");
    }
}
