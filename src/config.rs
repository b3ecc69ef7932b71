use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DATABASE_URL: &str = "sqlite://products.db?mode=rwc";
const DEFAULT_DB_PORT: u16 = 5432;
const CONFIG_DIR: &str = "config";
const DEFAULT_GENERATION_BASE_URL: &str = "https://api.replicate.com/v1";
const DEFAULT_GENERATION_MODEL: &str = "meta/meta-llama-3-8b-instruct";
const GENERATION_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

/// Remote text-generation settings. Sampling parameters are fixed per deployment.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Bearer token for the generation API; generation requests fail while unset
    #[serde(default)]
    pub api_token: Option<String>,

    /// Model identifier, `owner/name` or `owner/name:version`
    #[serde(default = "default_generation_model")]
    #[validate(length(min = 3))]
    pub model: String,

    /// API root, without trailing slash
    #[serde(default = "default_generation_base_url")]
    #[validate(url)]
    pub base_url: String,

    #[serde(default = "default_max_new_tokens")]
    #[validate(range(min = 1, max = 8192))]
    pub max_new_tokens: u32,

    #[serde(default = "default_min_new_tokens")]
    pub min_new_tokens: u32,

    #[serde(default = "default_temperature")]
    #[validate(range(min = 0.0, max = 5.0))]
    pub temperature: f64,

    /// Upper bound for one generation attempt, polling included
    #[serde(default = "default_generation_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,

    /// Delay between status polls of an unfinished prediction
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 50, max = 60000))]
    pub poll_interval_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            model: default_generation_model(),
            base_url: default_generation_base_url(),
            max_new_tokens: default_max_new_tokens(),
            min_new_tokens: default_min_new_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl GenerationConfig {
    /// Returns the token if one is configured and non-blank
    pub fn api_token(&self) -> Option<&str> {
        self.api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Full database connection URL; takes precedence over the `db_*` parts
    #[serde(default)]
    pub database_url: Option<String>,

    /// PostgreSQL connection parts, used when `database_url` is unset
    #[serde(default)]
    pub db_host: Option<String>,
    #[serde(default)]
    pub db_port: Option<u16>,
    #[serde(default)]
    pub db_user: Option<String>,
    #[serde(default)]
    pub db_password: Option<String>,
    #[serde(default)]
    pub db_name: Option<String>,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Create the products table on startup when it is missing
    #[serde(default = "default_true_bool")]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Text generation service
    #[serde(default)]
    #[validate]
    pub generation: GenerationConfig,
}

impl AppConfig {
    /// Creates a new configuration
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url: Some(database_url),
            db_host: None,
            db_port: None,
            db_user: None,
            db_password: None,
            db_name: None,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            generation: GenerationConfig::default(),
        }
    }

    /// Resolves the database URL.
    ///
    /// An explicit `database_url` wins; otherwise a PostgreSQL URL is assembled from the
    /// `db_*` parts when `db_host` is set, falling back to a local SQLite file.
    pub fn database_url(&self) -> Result<String, AppConfigError> {
        if let Some(url) = self
            .database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
        {
            return Ok(url.to_string());
        }

        let Some(host) = self.db_host.as_deref().filter(|h| !h.trim().is_empty()) else {
            return Ok(DEFAULT_DATABASE_URL.to_string());
        };

        let invalid = |what: &str| AppConfigError::DatabaseUrl(format!("invalid {what}"));

        let mut url = Url::parse("postgres://localhost").map_err(|_| invalid("base url"))?;
        url.set_host(Some(host.trim())).map_err(|_| invalid("db_host"))?;
        url.set_port(Some(self.db_port.unwrap_or(DEFAULT_DB_PORT)))
            .map_err(|_| invalid("db_port"))?;
        if let Some(user) = self.db_user.as_deref() {
            url.set_username(user).map_err(|_| invalid("db_user"))?;
        }
        if let Some(password) = self.db_password.as_deref() {
            url.set_password(Some(password))
                .map_err(|_| invalid("db_password"))?;
        }
        if let Some(name) = self.db_name.as_deref() {
            url.set_path(name);
        }

        Ok(url.to_string())
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.generation.min_new_tokens > self.generation.max_new_tokens {
            let mut err = ValidationError::new("min_new_tokens");
            err.message =
                Some("generation.min_new_tokens cannot exceed generation.max_new_tokens".into());
            errors.add("generation", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Database URL could not be assembled: {0}")]
    DatabaseUrl(String),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true_bool() -> bool {
    true
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.to_string()
}

fn default_generation_base_url() -> String {
    DEFAULT_GENERATION_BASE_URL.to_string()
}

fn default_max_new_tokens() -> u32 {
    500
}

fn default_min_new_tokens() -> u32 {
    150
}

fn default_temperature() -> f64 {
    0.75
}

fn default_generation_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("product_copy_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let mut app_config: AppConfig = config.try_deserialize()?;

    if app_config.generation.api_token().is_none() {
        app_config.generation.api_token = env::var(GENERATION_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty());
    }
    if app_config.generation.api_token().is_none() {
        warn!(
            "No generation API token configured (APP__GENERATION__API_TOKEN or {}); description generation will fail",
            GENERATION_TOKEN_ENV
        );
    }

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    // Resolve eagerly so a malformed db_* combination fails at startup
    app_config.database_url()?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
