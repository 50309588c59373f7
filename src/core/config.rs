//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::core::models::Role;
use crate::core::prompt::{ChatPromptTemplate, MessageTemplate, LANGUAGE_VARIABLE};

/// Default chat-completions base URL
pub const DEFAULT_API_BASE: &str = "https://open.bigmodel.cn/api/paas/v4";

/// Default chat model
pub const DEFAULT_MODEL: &str = "glm-3-turbo";

/// Default system instruction; `{language}` is filled per request
pub const DEFAULT_SYSTEM_TEMPLATE: &str = "translate the following into {language}:";

/// Configuration for the translation service
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub timeout_ms: u64,
    pub host: String,
    pub port: u16,
    pub system_template: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            timeout_ms: 60000,
            host: "localhost".to_string(),
            port: 8000,
            system_template: DEFAULT_SYSTEM_TEMPLATE.to_string(),
        }
    }
}

// Hand-written so the key never ends up in logs.
impl std::fmt::Debug for TranslatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_ms", &self.timeout_ms)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("system_template", &self.system_template)
            .finish()
    }
}

impl TranslatorConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration: defaults, then the optional file, then the environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    /// Load from a JSON, TOML or YAML file; the format follows the extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override fields from environment variables that are set
    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(api_key) = std::env::var("ZHIPUAI_API_KEY") {
            self.api_key = api_key;
        }

        if let Ok(api_base) = std::env::var("ZHIPUAI_API_BASE") {
            self.api_base = api_base;
        }

        if let Ok(model) = std::env::var("ZHIPUAI_MODEL") {
            self.model = model;
        }

        if let Ok(temperature) = std::env::var("ZHIPUAI_TEMPERATURE") {
            self.temperature = Some(temperature.parse::<f32>()?);
        }

        if let Ok(timeout_ms) = std::env::var("REQUEST_TIMEOUT_MS") {
            self.timeout_ms = timeout_ms.parse::<u64>()?;
        }

        if let Ok(host) = std::env::var("HOST") {
            self.host = host;
        }

        if let Ok(port) = std::env::var("PORT") {
            self.port = port.parse::<u16>()?;
        }

        if let Ok(system_template) = std::env::var("SYSTEM_TEMPLATE") {
            self.system_template = system_template;
        }

        Ok(())
    }

    /// Validate the settings needed to talk to the provider
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            return Err(anyhow::anyhow!("API key is required"));
        }

        if self.api_base.is_empty() {
            return Err(anyhow::anyhow!("API base URL is required"));
        }

        if self.model.is_empty() {
            return Err(anyhow::anyhow!("Model name is required"));
        }

        if self.timeout_ms == 0 {
            return Err(anyhow::anyhow!("timeout_ms must be greater than 0"));
        }

        if let Some(temperature) = self.temperature {
            if temperature <= 0.0 || temperature > 1.0 {
                return Err(anyhow::anyhow!(
                    "temperature must be in (0, 1], got {}",
                    temperature
                ));
            }
        }

        Ok(())
    }

    /// Build the translation prompt from the configured system template
    pub fn prompt_template(&self) -> anyhow::Result<ChatPromptTemplate> {
        let system = MessageTemplate::new(Role::System, self.system_template.as_str())?;
        let unexpected: Vec<&String> = system
            .variables()
            .iter()
            .filter(|v| v.as_str() != LANGUAGE_VARIABLE)
            .collect();
        if !unexpected.is_empty() {
            return Err(anyhow::anyhow!(
                "system_template may only reference {{language}}, found {:?}",
                unexpected
            ));
        }
        Ok(ChatPromptTemplate::translation(&self.system_template)?)
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_validation() {
        let config = TranslatorConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_missing_key() {
        let config = TranslatorConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_temperature_range() {
        let mut config = TranslatorConfig {
            api_key: "test_key".to_string(),
            temperature: Some(0.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.temperature = Some(0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_match_reference_server() {
        let config = TranslatorConfig::default();
        assert_eq!(config.bind_address(), "localhost:8000");
        assert_eq!(config.model, "glm-3-turbo");
    }

    #[test]
    fn test_from_toml_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "model = \"glm-4\"\nport = 9000").unwrap();

        let config = TranslatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.model, "glm-4");
        assert_eq!(config.port, 9000);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.system_template, DEFAULT_SYSTEM_TEMPLATE);
    }

    #[test]
    fn test_to_file_roundtrip_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translator.json");
        let config = TranslatorConfig {
            model: "glm-4-flash".to_string(),
            temperature: Some(0.5),
            ..Default::default()
        };

        config.to_file(&path).unwrap();
        let loaded = TranslatorConfig::from_file(&path).unwrap();
        assert_eq!(loaded.model, "glm-4-flash");
        assert_eq!(loaded.temperature, Some(0.5));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = TranslatorConfig {
            api_key: "sk-secret".to_string(),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_prompt_template_rejects_unknown_variables() {
        let config = TranslatorConfig {
            system_template: "translate into {language} for {audience}:".to_string(),
            ..Default::default()
        };
        assert!(config.prompt_template().is_err());

        // The user text is already the second message.
        let config = TranslatorConfig {
            system_template: "translate {text} into {language}:".to_string(),
            ..Default::default()
        };
        let err = config.prompt_template().unwrap_err();
        assert!(err.to_string().contains("text"));

        let config = TranslatorConfig::default();
        let prompt = config.prompt_template().unwrap();
        assert_eq!(prompt.input_variables(), ["language", "text"]);
    }
}
