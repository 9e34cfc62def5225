// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_enabled() -> bool {
    true
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OracleConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Only "openai" for now (case-insensitive).
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Whole-request timeout for one oracle call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OracleConfig {
    /// Normalize provider, resolve the "ENV" key placeholder, sanitize timeout.
    pub fn resolve(mut self) -> anyhow::Result<Self> {
        self.provider = self.provider.trim().to_lowercase();

        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }

        // Mock mode and disabled oracles never talk to a provider.
        let mock = env::var("AI_TEST_MODE").map(|v| v == "mock").unwrap_or(false);
        if !self.enabled || mock {
            return Ok(self);
        }

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_table_gets_defaults() {
        let cfg: OracleConfig = toml::from_str(r#"model = "gpt-4o""#).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.timeout_secs, 60);
    }

    #[test]
    fn disabled_oracle_skips_key_resolution() {
        let cfg = OracleConfig {
            enabled: false,
            provider: " OpenAI ".into(),
            timeout_secs: 0,
            ..OracleConfig::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.api_key, "ENV");
        assert_eq!(cfg.timeout_secs, 60);
    }
}
