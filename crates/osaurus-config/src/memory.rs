use serde::Deserialize;

/// Agent memory configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Inject memory context on chat routes carrying an agent id
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Most recent entries rendered into the injected context
    #[serde(default = "default_max_context_entries")]
    pub max_context_entries: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_context_entries: default_max_context_entries(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_max_context_entries() -> usize {
    8
}
