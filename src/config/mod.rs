use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection string for the result store
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// OpenAI API key. Provider calls fail fast when unset.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Directory holding `palm-validation.prompt` and `palm-analysis.prompt`
    #[serde(default = "default_prompt_dir")]
    pub prompt_dir: PathBuf,

    /// Keep a copy of generated card images in the store
    #[serde(default = "default_true")]
    pub enable_image_storage: bool,

    /// Persist raw provider prompts and responses for debugging
    #[serde(default = "default_true")]
    pub enable_prompt_logs: bool,

    /// External-facing base URL used for links to stored images
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Lifetime of records, images and logs in seconds (30 days)
    #[serde(default = "default_record_ttl_secs")]
    pub record_ttl_secs: u64,

    /// Per-image upload ceiling in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// Overall timeout for a single provider request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_prompt_dir() -> PathBuf {
    PathBuf::from("prompts")
}

fn default_true() -> bool {
    true
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_record_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_http_timeout_secs() -> u64 {
    120
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            redis_url: default_redis_url(),
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            prompt_dir: default_prompt_dir(),
            enable_image_storage: true,
            enable_prompt_logs: true,
            public_base_url: default_public_base_url(),
            record_ttl_secs: default_record_ttl_secs(),
            max_image_bytes: default_max_image_bytes(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.record_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Request body ceiling: two images plus multipart framing.
    pub fn body_limit(&self) -> usize {
        self.max_image_bytes * 2 + 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.record_ttl(), Duration::from_secs(2_592_000));
        assert_eq!(config.max_image_bytes, 10 * 1024 * 1024);
        assert!(config.openai_api_key.is_none());
        assert!(config.body_limit() > config.max_image_bytes * 2);
    }
}
