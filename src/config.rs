use anyhow::Result;
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub mongodb_url: String,
    pub server_address: String,
    pub max_pool_size: u32,
    pub write_timeout_ms: u64,
    pub journal: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            mongodb_url: env::var("MONGODB_URL")
                .unwrap_or_else(|_| "mongodb://localhost:27017/mongo_helper".to_string()),
            server_address: env::var("SERVER_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            max_pool_size: env::var("MONGODB_MAX_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            write_timeout_ms: env::var("MONGODB_WRITE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(200),
            journal: env::var("MONGODB_JOURNAL")
                .map(|s| !matches!(s.trim().to_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
        })
    }

    /// Configuration pointing at `mongodb_url` with every other setting at its default.
    pub fn with_url(mongodb_url: impl Into<String>) -> Self {
        Config {
            mongodb_url: mongodb_url.into(),
            server_address: "127.0.0.1:0".to_string(),
            max_pool_size: 100,
            write_timeout_ms: 200,
            journal: true,
        }
    }
}
