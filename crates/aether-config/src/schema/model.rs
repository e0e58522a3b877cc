//! Completion service settings.

use serde::{Deserialize, Serialize};

/// Remote completion service configuration.
///
/// The API key itself never lives in the file; `api_key_env` names the
/// environment variable it is read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// OpenAI-compatible base URL (without `/chat/completions`).
    pub base_url: String,
    pub model: String,
    /// Token cap for every phase except naming (valid range: 16-32000).
    pub max_tokens: u32,
    /// Sampling temperature (valid range: 0.0-2.0).
    pub temperature: f64,
    pub api_key_env: String,
    /// Whole-request timeout in seconds (valid range: 5-600).
    pub request_timeout_secs: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4.1-nano".into(),
            max_tokens: 500,
            temperature: 0.7,
            api_key_env: "OPENAI_API_KEY".into(),
            request_timeout_secs: 120,
        }
    }
}
