use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_MODEL_DIR: &str = "trained_models";
const DEFAULT_PREDICTION_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_FORECAST_CONCURRENCY: usize = 4;
const DEFAULT_OTP_TTL_SECS: u64 = 300;
const DEFAULT_OTP_LENGTH: usize = 6;
const DEFAULT_OTP_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_OTP_NAMESPACE: &str = "retailx:otp";
const DEFAULT_ASSISTANT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Model names tried in order until one answers.
pub const DEFAULT_ASSISTANT_MODELS: [&str; 8] = [
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-pro-latest",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-1.0-pro",
];

/// Festival forecasting configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ForecastConfig {
    /// Directory holding `<festival>_<product>.<ext>` model artifacts
    #[serde(default = "default_model_dir")]
    #[validate(length(min = 1))]
    pub model_dir: String,

    /// Upper bound for decoding and predicting a single artifact
    #[serde(default = "default_prediction_timeout_ms")]
    #[validate(range(min = 10, max = 120000))]
    pub prediction_timeout_ms: u64,

    /// Artifacts evaluated at the same time for one request
    #[serde(default = "default_forecast_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub max_concurrency: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            prediction_timeout_ms: default_prediction_timeout_ms(),
            max_concurrency: default_forecast_concurrency(),
        }
    }
}

/// One-time password configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct OtpConfig {
    /// "in-memory" or "redis"
    #[serde(default = "default_otp_backend")]
    #[validate(custom = "validate_otp_backend")]
    pub backend: String,

    #[serde(default = "default_otp_ttl_secs")]
    #[validate(range(min = 30, max = 3600))]
    pub ttl_secs: u64,

    /// Number of digits in a generated code
    #[serde(default = "default_otp_length")]
    #[validate(range(min = 4, max = 10))]
    pub length: usize,

    /// Wrong guesses tolerated before the pending registration is dropped
    #[serde(default = "default_otp_max_attempts")]
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: u32,

    /// Key prefix when the redis backend is used
    #[serde(default = "default_otp_namespace")]
    pub namespace: String,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            backend: default_otp_backend(),
            ttl_secs: default_otp_ttl_secs(),
            length: default_otp_length(),
            max_attempts: default_otp_max_attempts(),
            namespace: default_otp_namespace(),
        }
    }
}

/// Outbound notification configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    /// "log" or "webhook"
    #[serde(default = "default_notification_backend")]
    #[validate(custom = "validate_notification_backend")]
    pub backend: String,

    /// Endpoint receiving `{to, subject, text}` when backend is "webhook"
    #[serde(default)]
    #[validate(url)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_sender")]
    pub sender: String,

    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            backend: default_notification_backend(),
            webhook_url: None,
            sender: default_sender(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Conversational assistant configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AssistantConfig {
    /// Leave unset to run with the assistant disabled
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_assistant_base_url")]
    #[validate(url)]
    pub base_url: String,

    #[serde(default = "default_assistant_models")]
    #[validate(length(min = 1))]
    pub models: Vec<String>,

    #[serde(default = "default_assistant_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_assistant_base_url(),
            models: default_assistant_models(),
            timeout_secs: default_assistant_timeout_secs(),
        }
    }
}

impl AssistantConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .map_or(false, |key| !key.trim().is_empty())
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL (OTP store and health checks)
    pub redis_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    #[validate(range(min = 300, max = 86400))]
    pub jwt_expiration: usize,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
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

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// CORS: allow credentials
    #[serde(default)]
    pub cors_allow_credentials: bool,

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

    /// JWT issuer name
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// JWT audience
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    #[serde(default)]
    #[validate]
    pub forecast: ForecastConfig,

    #[serde(default)]
    #[validate]
    pub otp: OtpConfig,

    #[serde(default)]
    #[validate]
    pub notifications: NotificationConfig,

    #[serde(default)]
    #[validate]
    pub assistant: AssistantConfig,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials
    pub fn new(
        database_url: String,
        redis_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            redis_url,
            jwt_secret,
            jwt_expiration: 3600,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            forecast: ForecastConfig::default(),
            otp: OtpConfig::default(),
            notifications: NotificationConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        matches!(
            self.environment.to_ascii_lowercase().as_str(),
            "development" | "dev" | "local" | "test"
        )
    }

    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_deref()
            .map_or(false, |raw| raw.split(',').any(|o| !o.trim().is_empty()))
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.cors_allow_any_origin || self.is_development()
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

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET to a unique, secure value."
                    .into(),
            );
            errors.add("jwt_secret", err);
        }

        if self.notifications.backend.eq_ignore_ascii_case("webhook")
            && self.notifications.webhook_url.is_none()
        {
            let mut err = ValidationError::new("webhook_url_required");
            err.message =
                Some("notifications.webhook_url is required for the webhook backend".into());
            errors.add("notifications", err);
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

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
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

fn default_auth_issuer() -> String {
    "retailx-auth".to_string()
}

fn default_auth_audience() -> String {
    "retailx-api".to_string()
}

fn default_model_dir() -> String {
    DEFAULT_MODEL_DIR.to_string()
}
fn default_prediction_timeout_ms() -> u64 {
    DEFAULT_PREDICTION_TIMEOUT_MS
}
fn default_forecast_concurrency() -> usize {
    DEFAULT_FORECAST_CONCURRENCY
}

fn default_otp_backend() -> String {
    "in-memory".to_string()
}
fn default_otp_ttl_secs() -> u64 {
    DEFAULT_OTP_TTL_SECS
}
fn default_otp_length() -> usize {
    DEFAULT_OTP_LENGTH
}
fn default_otp_max_attempts() -> u32 {
    DEFAULT_OTP_MAX_ATTEMPTS
}
fn default_otp_namespace() -> String {
    DEFAULT_OTP_NAMESPACE.to_string()
}

fn default_notification_backend() -> String {
    "log".to_string()
}
fn default_sender() -> String {
    "RetailX <no-reply@retailx.local>".to_string()
}
fn default_http_timeout_secs() -> u64 {
    10
}

fn default_assistant_base_url() -> String {
    DEFAULT_ASSISTANT_BASE_URL.to_string()
}
fn default_assistant_models() -> Vec<String> {
    DEFAULT_ASSISTANT_MODELS
        .iter()
        .map(|m| m.to_string())
        .collect()
}
fn default_assistant_timeout_secs() -> u64 {
    30
}

fn validate_otp_backend(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "in-memory" | "redis" => Ok(()),
        _ => {
            let mut err = ValidationError::new("otp_backend");
            err.message = Some("Must be one of: in-memory, redis".into());
            Err(err)
        }
    }
}

fn validate_notification_backend(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "log" | "webhook" => Ok(()),
        _ => {
            let mut err = ValidationError::new("notification_backend");
            err.message = Some("Must be one of: log, webhook".into());
            Err(err)
        }
    }
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

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if trimmed.len() < 64 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must be at least 64 characters for adequate security".into());
        return Err(err);
    }

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some("JWT secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    let lower = trimmed.to_ascii_lowercase();
    let weak_fragments = ["changeme", "password", "12345", "abcdef"];
    if weak_fragments.iter().any(|pattern| lower.contains(pattern)) {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some(
            "JWT secret appears to be weak; use a cryptographically strong random string".into(),
        );
        return Err(err);
    }

    let unique_chars: std::collections::HashSet<char> = trimmed.chars().collect();
    if unique_chars.len() < 10 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must have at least 10 unique characters for adequate entropy".into());
        return Err(err);
    }

    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("retailx_api={},tower_http=debug", level);
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

    // no default for jwt_secret
    let config = Config::builder()
        .set_default("database_url", "sqlite://retailx.db?mode=rwc")?
        .set_default("redis_url", "redis://localhost:6379")?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET environment variable with a secure random string (minimum 64 characters).");
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
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "Xk9#mQ2$vL7@pR4!nW8^tY3&hJ6*bF1%zC5(dG0)sA-eU+iO=lK~qP<wE>rT|yN7v";

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite://retailx.db?mode=memory".into(),
            "redis://127.0.0.1:6379".into(),
            SECRET.into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn non_dev_requires_cors_origins() {
        let cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn non_dev_with_origins_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://retailx.example".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn webhook_backend_needs_url() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        cfg.notifications.backend = "webhook".into();
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.notifications.webhook_url = Some("https://hooks.retailx.example/mail".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn defaults_pass_field_validation() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.forecast.model_dir, "trained_models");
        assert_eq!(cfg.otp.ttl_secs, 300);
        assert_eq!(cfg.assistant.models[0], "gemini-2.5-flash");
        assert!(!cfg.assistant.is_configured());
    }

    #[test]
    fn weak_jwt_secret_is_rejected() {
        assert!(validate_jwt_secret(&"a".repeat(80)).is_err());
        assert!(validate_jwt_secret("short").is_err());
        assert!(validate_jwt_secret(SECRET).is_ok());
    }

    #[test]
    fn unknown_otp_backend_is_rejected() {
        let mut cfg = base_config();
        cfg.otp.backend = "memcached".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.errors().contains_key("otp"));
    }
}
