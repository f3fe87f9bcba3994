use std::env;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::errors::{AppError, AppResult};

const DEFAULT_MODEL_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL_NAME: &str = "gpt-4o-mini";
const DEFAULT_MAX_DOCUMENT_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub web_server_host: String,
    pub web_server_port: u16,
    pub model_api_key: SecretString,
    pub model_api_base: String,
    pub model_name: String,
    pub model_timeout_secs: u64,
    pub max_document_bytes: usize,
    /// Ask the model to steer clear of questions already in the session
    pub avoid_repeats: bool,
    pub cors_allowed_origin: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            web_server_host: env::var("WEB_SERVER_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            web_server_port: env::var("WEB_SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            model_api_key: SecretString::from(env::var("MODEL_API_KEY").unwrap_or_default()),
            model_api_base: env::var("MODEL_API_BASE")
                .unwrap_or_else(|_| DEFAULT_MODEL_API_BASE.to_string()),
            model_name: env::var("MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL_NAME.to_string()),
            model_timeout_secs: env::var("MODEL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120),
            max_document_bytes: env::var("MAX_DOCUMENT_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_DOCUMENT_BYTES),
            avoid_repeats: env::var("QUIZ_AVOID_REPEATS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        }
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn has_model_api_key(&self) -> bool {
        !self.model_api_key.expose_secret().trim().is_empty()
    }

    /// Checks the settings the server cannot run without
    pub fn validate_for_production(&self) -> AppResult<()> {
        if !self.has_model_api_key() {
            return Err(AppError::ValidationError(
                "MODEL_API_KEY is not set. Set it to the key of the model provider.".to_string(),
            ));
        }

        if self.model_timeout_secs == 0 {
            return Err(AppError::ValidationError(
                "MODEL_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        if self.max_document_bytes == 0 {
            return Err(AppError::ValidationError(
                "MAX_DOCUMENT_BYTES must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn test_config() -> Self {
        Self {
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 8080,
            model_api_key: SecretString::from("test_model_key".to_string()),
            model_api_base: "http://localhost:9999/v1".to_string(),
            model_name: "test-model".to_string(),
            model_timeout_secs: 5,
            max_document_bytes: 1024 * 1024,
            avoid_repeats: false,
            cors_allowed_origin: "*".to_string(),
        }
    }
}
