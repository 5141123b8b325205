use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastConfig {
    #[serde(default = "default_periods")]
    pub default_periods: usize,
    #[serde(default = "default_max_periods")]
    pub max_periods: usize,
    /// Noise standard deviation as a fraction of the history's std.
    #[serde(default = "default_noise_ratio")]
    pub noise_ratio: f64,
    /// Fixed seed for the noise generator; unseeded when absent.
    #[serde(default)]
    pub noise_seed: Option<u64>,
    #[serde(default = "default_alpha")]
    pub smoothing_alpha: f64,
    #[serde(default = "default_confidence")]
    pub default_confidence: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            default_periods: default_periods(),
            max_periods: default_max_periods(),
            noise_ratio: default_noise_ratio(),
            noise_seed: None,
            smoothing_alpha: default_alpha(),
            default_confidence: default_confidence(),
        }
    }
}

fn default_periods() -> usize {
    30
}
fn default_max_periods() -> usize {
    365
}
fn default_noise_ratio() -> f64 {
    0.1
}
fn default_alpha() -> f64 {
    0.3
}
fn default_confidence() -> f64 {
    0.95
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            max_sessions: default_max_sessions(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}
fn default_max_sessions() -> usize {
    1000
}
fn default_purge_interval() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            preview_rows: default_preview_rows(),
        }
    }
}

fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_preview_rows() -> usize {
    100
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("SALESCAST").separator("__"))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }
}
