use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::middleware_helpers::retry::RetryConfig;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8081;
const CONFIG_DIR: &str = "config";
const DEFAULT_PAYMENT_API_BASE_URL: &str = "https://api.stripe.com/v1";
const DEFAULT_COURIER_AUTH_URL: &str = "https://login.uber.com/oauth/v2/token";
const DEFAULT_COURIER_API_BASE_URL: &str = "https://api.uber.com/v1/customers";
const DEFAULT_COURIER_SCOPE: &str = "eats.deliveries";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// HS256 secret used to verify identity tokens
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
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

    /// Ask the courier for robo-courier simulation instead of real dispatch
    #[serde(default)]
    pub test_mode: bool,

    /// Lets ADMIN act on any store without a manager-store row
    #[serde(default)]
    pub admin_bypasses_store_check: bool,

    // ========== Payment processor ==========
    #[serde(default = "default_payment_api_base_url")]
    pub payment_api_base_url: String,

    #[serde(default)]
    pub payment_secret_key: String,

    // ========== Courier ==========
    #[serde(default = "default_courier_auth_url")]
    pub courier_auth_url: String,

    #[serde(default = "default_courier_api_base_url")]
    pub courier_api_base_url: String,

    #[serde(default)]
    pub courier_customer_id: String,

    #[serde(default)]
    pub courier_client_id: String,

    #[serde(default)]
    pub courier_client_secret: String,

    #[serde(default = "default_courier_scope")]
    pub courier_scope: String,

    // ========== Outbound calls ==========
    /// Per-request timeout for processor and courier calls
    #[serde(default = "default_adapter_timeout_secs")]
    pub adapter_timeout_secs: u64,

    /// Attempts per outbound call, including the first
    #[serde(default = "default_adapter_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub adapter_max_attempts: u32,

    #[serde(default = "default_adapter_initial_backoff_ms")]
    pub adapter_initial_backoff_ms: u64,
}

impl AppConfig {
    /// Creates a configuration with every optional setting at its default
    pub fn new(
        database_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            test_mode: false,
            admin_bypasses_store_check: false,
            payment_api_base_url: default_payment_api_base_url(),
            payment_secret_key: String::new(),
            courier_auth_url: default_courier_auth_url(),
            courier_api_base_url: default_courier_api_base_url(),
            courier_customer_id: String::new(),
            courier_client_id: String::new(),
            courier_client_secret: String::new(),
            courier_scope: default_courier_scope(),
            adapter_timeout_secs: default_adapter_timeout_secs(),
            adapter_max_attempts: default_adapter_max_attempts(),
            adapter_initial_backoff_ms: default_adapter_initial_backoff_ms(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }

    /// Retry settings shared by the processor and courier clients
    pub fn adapter_retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.adapter_max_attempts,
            initial_delay: Duration::from_millis(self.adapter_initial_backoff_ms),
            ..RetryConfig::default()
        }
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() {
            if self.payment_secret_key.trim().is_empty() {
                let mut err = ValidationError::new("payment_secret_key");
                err.message = Some("payment_secret_key is required in production".into());
                errors.add("payment_secret_key", err);
            }
            if self.courier_client_id.trim().is_empty()
                || self.courier_client_secret.trim().is_empty()
            {
                let mut err = ValidationError::new("courier_credentials");
                err.message =
                    Some("courier_client_id and courier_client_secret are required in production".into());
                errors.add("courier_client_id", err);
            }
            if self.test_mode {
                let mut err = ValidationError::new("test_mode");
                err.message = Some("test_mode cannot be enabled in production".into());
                errors.add("test_mode", err);
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
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

fn default_payment_api_base_url() -> String {
    DEFAULT_PAYMENT_API_BASE_URL.to_string()
}

fn default_courier_auth_url() -> String {
    DEFAULT_COURIER_AUTH_URL.to_string()
}

fn default_courier_api_base_url() -> String {
    DEFAULT_COURIER_API_BASE_URL.to_string()
}

fn default_courier_scope() -> String {
    DEFAULT_COURIER_SCOPE.to_string()
}

fn default_adapter_timeout_secs() -> u64 {
    10
}
fn default_adapter_max_attempts() -> u32 {
    3
}
fn default_adapter_initial_backoff_ms() -> u64 {
    200
}

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

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
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
    load_config_from(Path::new(CONFIG_DIR))
}

pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let dir = config_dir.display();
    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::with_name(&format!("{}/default", dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET (minimum 32 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
