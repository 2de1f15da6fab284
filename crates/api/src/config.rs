use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    /// Search engine the report queries run against
    pub search: SearchConfig,
    /// Report mail delivery
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the search engine, e.g. http://localhost:9200
    pub base_url: String,

    /// Basic auth username (optional)
    #[serde(default)]
    pub username: String,

    /// Basic auth password (optional)
    #[serde(default)]
    pub password: String,

    /// Request timeout in seconds; 0 disables the timeout
    #[serde(default)]
    pub timeout_secs: u64,
}

impl SearchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        (!self.username.is_empty()).then_some((self.username.as_str(), self.password.as_str()))
    }
}

/// Email service configuration for report delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether email sending is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Email provider: smtp, sendgrid, or console (for development)
    #[serde(default = "default_email_provider")]
    pub provider: String,

    #[serde(default)]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: String,

    #[serde(default)]
    pub smtp_password: String,

    /// STARTTLS for SMTP (default: true)
    #[serde(default = "default_smtp_tls")]
    pub smtp_use_tls: bool,

    #[serde(default)]
    pub sendgrid_api_key: String,

    /// Sender email address (From header)
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Sender name (From header)
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_email_provider(),
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_use_tls: default_smtp_tls(),
            sendgrid_api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportsConfig {
    /// Directory report files are written to before delivery
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,

    /// Re-register stored reports at startup
    #[serde(default = "default_warm_start")]
    pub warm_start: bool,

    /// How long shutdown waits for job loops to stop
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            tmp_dir: default_tmp_dir(),
            warm_start: default_warm_start(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_email_provider() -> String {
    "console".to_string()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_smtp_tls() -> bool {
    true
}
fn default_sender_email() -> String {
    "reports@example.com".to_string()
}
fn default_sender_name() -> String {
    "Scheduled Reports".to_string()
}
fn default_tmp_dir() -> PathBuf {
    PathBuf::from("tmp")
}
fn default_warm_start() -> bool {
    true
}
fn default_shutdown_timeout() -> u64 {
    30
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

const DEFAULTS: &str = r#"
    [server]
    host = "0.0.0.0"
    port = 8080
    request_timeout_secs = 30

    [database]
    url = ""
    max_connections = 10
    min_connections = 1
    connect_timeout_secs = 10
    idle_timeout_secs = 600

    [logging]
    level = "info"
    format = "json"

    [search]
    base_url = "http://localhost:9200"

    [email]
    enabled = false
    provider = "console"
    sender_email = "test@example.com"
    sender_name = "Test"

    [reports]
    tmp_dir = "tmp"
    warm_start = false
    shutdown_timeout_secs = 1
"#;

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with SR__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("SR").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration from embedded defaults plus overrides.
    ///
    /// Used by tests, which cannot rely on the config directory being reachable.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "SR__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.search.base_url.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "SR__SEARCH__BASE_URL environment variable must be set".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
