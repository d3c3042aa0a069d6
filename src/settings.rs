use std::env;

use serde::Deserialize;
use tracing::info;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_env")]
    pub env: String, // development / production
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_json_limit")]
    pub json_limit: usize,
    #[serde(default)]
    pub rate_limit_per_min: Option<u32>,
}

impl Config {
    pub fn is_dev(&self) -> bool {
        self.env != "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: default_env(),
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
            json_limit: default_json_limit(),
            rate_limit_per_min: None,
        }
    }
}

fn default_env() -> String {
    "development".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3400
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_json_limit() -> usize {
    100 * 1024
}

pub fn get_config() -> Config {
    if env::var("ENV").is_err() {
        info!("using .env file as environment variable source");
        let _ = dotenvy::dotenv();
    }
    envy::from_env::<Config>().unwrap()
}
