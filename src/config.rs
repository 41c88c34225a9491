use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub vision: VisionConfig,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Realtime WebSocket URL, including the model query parameter
    pub realtime_url: String,

    /// Vision chat-completions URL
    pub vision_url: String,

    /// API key; falls back to the OPENAI_API_KEY environment variable
    pub api_key: Option<String>,

    /// Connection establishment timeout in seconds
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct VisionConfig {
    /// Capture period in milliseconds
    pub interval_ms: u64,

    /// Model asked to describe frames
    pub model: String,

    /// Fixed prompt sent with every frame
    pub prompt: String,

    /// Response length cap
    pub max_tokens: u32,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// The API key from the file, or from OPENAI_API_KEY.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = &self.api.api_key {
            return Ok(key.clone());
        }
        std::env::var("OPENAI_API_KEY")
            .context("No API key in config and OPENAI_API_KEY is not set")
    }
}
