use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if placeholder expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending key
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_engine_config()?;
        self.validate_server_config()?;
        Ok(())
    }

    fn validate_engine_config(&self) -> anyhow::Result<()> {
        let streaming = &self.engine.streaming;
        for (key, window) in [
            ("engine.streaming.openai_argument_window", streaming.openai_argument_window),
            ("engine.streaming.anthropic_argument_window", streaming.anthropic_argument_window),
            ("engine.streaming.responses_argument_window", streaming.responses_argument_window),
        ] {
            if window == 0 {
                anyhow::bail!("{key} must be at least 1");
            }
        }

        if let Some(ref default_model) = self.engine.default_model
            && !self.engine.models.is_empty()
            && !self.engine.models.contains(default_model)
        {
            anyhow::bail!("engine.default_model '{default_model}' is not listed in engine.models");
        }

        Ok(())
    }

    fn validate_server_config(&self) -> anyhow::Result<()> {
        if self.server.access_log.enabled && self.server.access_log.capacity == 0 {
            anyhow::bail!("server.access_log.capacity must be greater than 0");
        }

        if self.server.body_limit_bytes == 0 {
            anyhow::bail!("server.body_limit_bytes must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::{AllowList, Config, LogFormat};

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.listen_address().port(), 1337);
        assert!(config.server.cors.allowed_origins.is_disabled());
        assert_eq!(config.engine.streaming.openai_argument_window, 1024);
        assert_eq!(config.engine.streaming.anthropic_argument_window, 512);
        assert!(config.memory.enabled);
        assert!(config.stt.base_url.is_none());
    }

    #[test]
    fn full_file_round_trips_through_loader() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
listen_address = "0.0.0.0:9000"
[server.cors]
allowed_origins = ["https://app.example"]

[engine]
base_url = "http://localhost:8080/v1"
models = ["llama", "qwen"]
default_model = "qwen"

[telemetry]
log_format = "json"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.listen_address().port(), 9000);
        assert_eq!(
            config.server.cors.allowed_origins,
            AllowList::Origins(vec!["https://app.example".to_owned()])
        );
        assert_eq!(config.engine.default_model.as_deref(), Some("qwen"));
        assert_eq!(config.telemetry.unwrap().log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_zero_argument_window() {
        let err = Config::from_toml("[engine.streaming]\nopenai_argument_window = 0").unwrap_err();
        assert!(err.to_string().contains("openai_argument_window"));
    }

    #[test]
    fn rejects_unlisted_default_model() {
        let err = Config::from_toml("[engine]\nmodels = [\"a\"]\ndefault_model = \"b\"").unwrap_err();
        assert!(err.to_string().contains("default_model"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(Config::from_toml("[server]\nkeep_alive = true").is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Config::load(std::path::Path::new("/nonexistent/osaurus.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
