//! Process-wide configuration, read once from the environment at startup.

use std::fmt;

use crate::errors::AppError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Sampling parameters sent with every upstream completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self { temperature: 0.7, max_tokens: 2000 }
    }
}

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub port: u16,
    pub sampling: SamplingParams,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// `OPENAI_API_KEY` is required. `OPENAI_MODEL`, `OPENAI_BASE_URL` and
    /// `PORT` fall back to their defaults when unset.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::MissingConfig { name: "OPENAI_API_KEY".to_string() })?;

        let model = lookup("OPENAI_MODEL")
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = lookup("OPENAI_BASE_URL")
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| AppError::InvalidConfig {
                name: "PORT".to_string(),
                message: format!("'{raw}' is not a valid port ({e})"),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self { api_key, model, base_url, port, sampling: SamplingParams::default() })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("port", &self.port)
            .field("sampling", &self.sampling)
            .finish()
    }
}
