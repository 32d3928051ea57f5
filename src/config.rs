use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_FAILED_LINK: &str = "/checkout/failed";
const DEFAULT_PAYMENT_METHOD_CODE: &str = "kco";
const DEFAULT_SIGNATURE_TOLERANCE_SECS: u64 = 300;
const DEFAULT_SHIPPING_RATE: f64 = 10.0;

/// Webhook/callback configuration for the default store scope.
///
/// `carrier_mapping` and `shipping_rates` are kept as JSON-encoded strings,
/// matching the format the checkout provider's merchant portal exports; they
/// are decoded at settings resolution time.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Redirect target for every failed validation callback
    #[serde(default = "default_failed_link")]
    #[validate(custom = "validate_failed_link")]
    pub failed_link: String,

    /// JSON-encoded list of `{kss_carrier, shipping_method}` pairs
    #[serde(default)]
    pub carrier_mapping: Option<String>,

    /// Shared secret for HMAC signature verification; verification is skipped
    /// (with a warning) when unset
    #[serde(default)]
    pub secret: Option<String>,

    /// Signature timestamp tolerance (seconds)
    #[serde(default = "default_signature_tolerance_secs")]
    pub tolerance_secs: u64,

    /// Payment method code attached to force-placed carts
    #[serde(default = "default_payment_method_code")]
    pub payment_method_code: String,

    /// Flat shipping rate applied when a method code has no entry in
    /// `shipping_rates`
    #[serde(default = "default_shipping_rate")]
    pub default_shipping_rate: f64,

    /// JSON-encoded map of method code to flat rate, e.g.
    /// `{"flatrate_flatrate": "4.90"}`
    #[serde(default)]
    pub shipping_rates: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            failed_link: default_failed_link(),
            carrier_mapping: None,
            secret: None,
            tolerance_secs: default_signature_tolerance_secs(),
            payment_method_code: default_payment_method_code(),
            default_shipping_rate: default_shipping_rate(),
            shipping_rates: None,
        }
    }
}

/// Per-store overrides over the default webhook scope. Unset fields fall back
/// to [`WebhookConfig`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreOverrides {
    pub failed_link: Option<String>,
    pub carrier_mapping: Option<String>,
    pub payment_method_code: Option<String>,
    pub default_shipping_rate: Option<f64>,
    pub shipping_rates: Option<String>,
}

/// One row of the configured carrier mapping table. Field names follow the
/// provider's export format.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct CarrierMapping {
    pub kss_carrier: String,
    pub shipping_method: String,
}

/// Settings resolved for one store scope, ready for the validation pipeline.
#[derive(Clone, Debug)]
pub struct StoreSettings {
    pub failed_link: String,
    pub carrier_mappings: Vec<CarrierMapping>,
    pub payment_method_code: String,
    pub default_shipping_rate: Decimal,
    pub shipping_rates: HashMap<String, Decimal>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            failed_link: default_failed_link(),
            carrier_mappings: Vec::new(),
            payment_method_code: default_payment_method_code(),
            default_shipping_rate: Decimal::from(10),
            shipping_rates: HashMap::new(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

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

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

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

    /// Request timeout applied to the whole router (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Webhook/callback settings for the default store scope
    #[serde(default)]
    #[validate]
    pub webhook: WebhookConfig,

    /// Per-store overrides, keyed by store code
    #[serde(default)]
    pub stores: HashMap<String, StoreOverrides>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_failed_link() -> String {
    DEFAULT_FAILED_LINK.to_string()
}

fn default_payment_method_code() -> String {
    DEFAULT_PAYMENT_METHOD_CODE.to_string()
}

fn default_signature_tolerance_secs() -> u64 {
    DEFAULT_SIGNATURE_TOLERANCE_SECS
}

fn default_shipping_rate() -> f64 {
    DEFAULT_SHIPPING_RATE
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

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1024
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("dev")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
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

fn validate_failed_link(link: &str) -> Result<(), ValidationError> {
    // Absolute URL or an absolute path on the storefront host
    if link.starts_with('/') || url::Url::parse(link).is_ok() {
        return Ok(());
    }
    let mut err = ValidationError::new("failed_link");
    err.message = Some("failed_link must be an absolute URL or a path starting with '/'".into());
    Err(err)
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("checkout_sync_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
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

    let config = Config::builder()
        .set_default("database_url", "sqlite://checkout-sync.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config
        .validate()
        .map_err(|e| AppConfigError::Validation(e.to_string()))?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            environment: "test".into(),
            log_level: default_log_level(),
            log_json: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            webhook: WebhookConfig::default(),
            stores: HashMap::new(),
        }
    }

    #[test]
    fn default_webhook_config_validates() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.webhook.failed_link, DEFAULT_FAILED_LINK);
        assert_eq!(cfg.webhook.tolerance_secs, 300);
    }

    #[test]
    fn relative_failed_link_is_rejected() {
        let mut cfg = base_config();
        cfg.webhook.failed_link = "checkout/failed".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn absolute_url_failed_link_is_accepted() {
        let mut cfg = base_config();
        cfg.webhook.failed_link = "https://shop.example.com/checkout/failed".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn carrier_mapping_rows_deserialize_from_portal_export() {
        let raw = r#"[{"kss_carrier":"dhl_express","shipping_method":"flatrate"}]"#;
        let rows: Vec<CarrierMapping> = serde_json::from_str(raw).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kss_carrier, "dhl_express");
        assert_eq!(rows[0].shipping_method, "flatrate");
    }
}
