use serde::Deserialize;

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://api.inimcloud.com".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

/// Configuration for the Inim Cloud integration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Enable the integration (default: true when the section is present)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the Inim Cloud REST API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API access token
    pub token: String,

    /// Seconds between device snapshot polls (default: 30)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}
