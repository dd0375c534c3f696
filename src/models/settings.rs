// Settings data models
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_model: String,
    pub chat_model: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Backoff base in seconds; the wait after failed attempt `n` is
    /// `backoff_base_secs * 2^n`.
    pub backoff_base_secs: f64,
    /// User prompt templates, merged over the built-in ones.
    pub templates: BTreeMap<String, String>,
    pub icon_output_dir: Option<String>,
    /// Interpreter used for venv creation and dependency-free builds.
    pub python: Option<String>,
    pub inference_char_budget: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: String::from(DEFAULT_BASE_URL),
            image_model: String::from("dall-e-3"),
            chat_model: String::from(DEFAULT_CHAT_MODEL),
            timeout_secs: 60,
            max_attempts: 3,
            backoff_base_secs: 1.0,
            templates: BTreeMap::new(),
            icon_output_dir: None,
            python: None,
            inference_char_budget: 4000,
        }
    }
}

impl AppConfig {
    /// A usable (non-blank) API key, if any.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn icon_output_dir(&self) -> PathBuf {
        self.icon_output_dir
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("icons"))
    }

    /// Environment variables win over stored values.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(python) = std::env::var("AICONPACK_PYTHON") {
            if !python.trim().is_empty() {
                self.python = Some(python);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_api_key_is_unusable() {
        let mut config = AppConfig::default();
        assert!(config.api_key().is_none());
        config.api_key = Some("   ".into());
        assert!(config.api_key().is_none());
        config.api_key = Some("sk-test".into());
        assert_eq!(config.api_key(), Some("sk-test"));
    }

    #[test]
    fn test_partial_json_uses_serde_defaults() {
        let json = r#"{
            "base_url": "http://localhost:8080",
            "image_model": "dall-e-2",
            "chat_model": "gpt-4o-mini",
            "timeout_secs": 5,
            "max_attempts": 2,
            "backoff_base_secs": 0.5,
            "inference_char_budget": 100
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!(config.templates.is_empty());
        assert!(config.api_key.is_none());
        assert_eq!(config.icon_output_dir(), PathBuf::from("icons"));
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{ "api_key": "sk-test", "max_attempts": 5 }"#).unwrap();
        assert_eq!(config.api_key(), Some("sk-test"));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.inference_char_budget, 4000);
    }
}
