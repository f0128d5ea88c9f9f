/// Engine configuration module
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub api_base_url: String,
    pub api_token: String,
    pub request_timeout_seconds: u64,
    pub bind_addr: String,
    pub default_organization_id: Option<String>,
    pub limits: ViewLimits,
}

/// Tunable caps that bound rendering cost on large fleets
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewLimits {
    pub search_max_results: usize,
    pub list_chunk_size: usize,
    pub max_markers: usize,
    pub search_debounce_ms: u64,
}

impl Default for ViewLimits {
    fn default() -> Self {
        Self {
            search_max_results: 100,
            list_chunk_size: 50,
            max_markers: 50,
            search_debounce_ms: 300,
        }
    }
}

impl ViewLimits {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_base_url = env::var("FLEET_API_BASE_URL")
            .unwrap_or_else(|_| "https://sandboxapi.deere.com/platform".to_string());

        let api_token = env::var("FLEET_API_TOKEN").unwrap_or_default();

        let bind_addr = env::var("SHELL_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let default_organization_id = env::var("DEFAULT_ORGANIZATION_ID")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let defaults = ViewLimits::default();
        let limits = ViewLimits {
            search_max_results: env_usize("SEARCH_MAX_RESULTS", defaults.search_max_results),
            list_chunk_size: env_usize("LIST_CHUNK_SIZE", defaults.list_chunk_size),
            max_markers: env_usize("MAP_MAX_MARKERS", defaults.max_markers),
            search_debounce_ms: env_u64("SEARCH_DEBOUNCE_MS", defaults.search_debounce_ms),
        };

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_token,
            request_timeout_seconds: env_u64("FLEET_REQUEST_TIMEOUT_SECONDS", 30),
            bind_addr,
            default_organization_id,
            limits,
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// Caps of zero would hide everything, so they are clamped to one.
fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
        .max(1)
}
