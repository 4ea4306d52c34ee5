use std::env;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // AI provider
    pub anthropic_api_key: String,
    pub analysis_model: String,
    pub generation_model: String,

    // Expiration sweep
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            analysis_model: env::var("PERCH_ANALYSIS_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            generation_model: env::var("PERCH_GENERATION_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            sweep_interval_secs: env::var("PERCH_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("PERCH_SWEEP_INTERVAL_SECS must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
