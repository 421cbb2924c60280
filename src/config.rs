use std::collections::HashMap;
use std::env;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_ORDER_SCAN_DAYS: i64 = 365;
const DEFAULT_ORDER_SCAN_MAX_PAGES: u32 = 20;
const DEFAULT_PLATFORM_TIMEOUT_SECS: u64 = 30;

/// Application configuration. Constructed once at process start and passed
/// by reference into the services; nothing reads the environment afterwards.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Vendor platform RPC endpoint.
    #[validate(url)]
    pub platform_api_url: String,

    /// Static token sent on every platform call.
    #[validate(length(min = 1))]
    pub platform_api_token: String,

    /// Shared secret required on every inbound API request.
    #[validate(length(min = 1))]
    pub shared_key: String,

    /// The one fixed warehouse all movements happen in.
    #[validate(length(min = 1))]
    pub warehouse_id: String,

    /// The catalog ("inventory") products are looked up in.
    #[validate(length(min = 1))]
    pub inventory_id: String,

    /// Static comma-separated bin list, the bin-discovery fallback.
    #[serde(default)]
    pub fallback_locations: Option<String>,

    /// Operator override table: comma-separated `SKU=product_id` pairs.
    #[serde(default)]
    pub sku_overrides: Option<String>,

    /// Maximum lookback window for the order-number scan, in days.
    #[serde(default = "default_order_scan_days")]
    pub order_scan_days: i64,

    /// Page-count safety cap per scan window.
    #[serde(default = "default_order_scan_max_pages")]
    pub order_scan_max_pages: u32,

    /// Per-call HTTP timeout against the platform, in seconds.
    #[serde(default = "default_platform_timeout_secs")]
    pub platform_timeout_secs: u64,

    /// Server host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging).
    #[serde(default)]
    pub log_json: bool,

    /// CORS: comma-separated list of allowed origins.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
}

fn default_order_scan_days() -> i64 {
    DEFAULT_ORDER_SCAN_DAYS
}
fn default_order_scan_max_pages() -> u32 {
    DEFAULT_ORDER_SCAN_MAX_PAGES
}
fn default_platform_timeout_secs() -> u64 {
    DEFAULT_PLATFORM_TIMEOUT_SECS
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Parsed operator SKU override table.
    pub fn sku_override_table(&self) -> HashMap<String, i64> {
        parse_override_pairs(self.sku_overrides.as_deref().unwrap_or(""))
    }

    /// Parsed static fallback bin list.
    pub fn fallback_location_list(&self) -> Vec<String> {
        parse_comma_list(self.fallback_locations.as_deref().unwrap_or(""))
    }

    /// Constraints the `Validate` derive cannot express.
    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.order_scan_days <= 0 {
            errors.add("order_scan_days", ValidationError::new("must be positive"));
        }
        if self.order_scan_max_pages == 0 {
            errors.add(
                "order_scan_max_pages",
                ValidationError::new("must be positive"),
            );
        }
        if self.platform_timeout_secs == 0 {
            errors.add(
                "platform_timeout_secs",
                ValidationError::new("must be positive"),
            );
        }
        if self.port < 1024 {
            errors.add("port", ValidationError::new("must be >= 1024"));
        }
        if let Some(raw) = &self.sku_overrides {
            for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let valid = pair
                    .split_once('=')
                    .map(|(sku, id)| !sku.trim().is_empty() && id.trim().parse::<i64>().is_ok())
                    .unwrap_or(false);
                if !valid {
                    errors.add(
                        "sku_overrides",
                        ValidationError::new("expected SKU=product_id pairs"),
                    );
                    break;
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// `"A=1, B=2"` → `{A: 1, B: 2}`. Malformed pairs are skipped; validation
/// rejects them at startup so runtime parsing stays lenient.
pub fn parse_override_pairs(raw: &str) -> HashMap<String, i64> {
    raw.split(',')
        .filter_map(|pair| {
            let (sku, id) = pair.split_once('=')?;
            let sku = sku.trim();
            let id = id.trim().parse::<i64>().ok()?;
            if sku.is_empty() {
                None
            } else {
                Some((sku.to_string(), id))
            }
        })
        .collect()
}

pub fn parse_comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

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
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // Check for the required secrets up front for a clear startup message.
    for required in ["platform_api_token", "shared_key"] {
        if config.get_string(required).is_err() {
            error!(
                "{required} is not configured. Set APP__{} in the environment.",
                required.to_uppercase()
            );
            return Err(AppConfigError::Load(ConfigError::NotFound(format!(
                "{required} is required but not configured"
            ))));
        }
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

pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("relocation_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::new(filter_directive);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            platform_api_url: "https://platform.example.com/connector".to_string(),
            platform_api_token: "token".to_string(),
            shared_key: "secret".to_string(),
            warehouse_id: "77617".to_string(),
            inventory_id: "3001".to_string(),
            fallback_locations: None,
            sku_overrides: None,
            order_scan_days: DEFAULT_ORDER_SCAN_DAYS,
            order_scan_max_pages: DEFAULT_ORDER_SCAN_MAX_PAGES,
            platform_timeout_secs: DEFAULT_PLATFORM_TIMEOUT_SECS,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            cors_allowed_origins: None,
        }
    }

    #[test]
    fn override_pairs_parse_and_trim() {
        let table = parse_override_pairs("ABC=12, DEF = 34 ,,bad,X=notanum");
        assert_eq!(table.get("ABC"), Some(&12));
        assert_eq!(table.get("DEF"), Some(&34));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn comma_list_parses_and_trims() {
        assert_eq!(
            parse_comma_list(" A-01 ,B-02,, "),
            vec!["A-01".to_string(), "B-02".to_string()]
        );
        assert!(parse_comma_list("").is_empty());
    }

    #[test]
    fn additional_constraints_reject_zero_caps() {
        let mut cfg = base_config();
        cfg.order_scan_max_pages = 0;
        assert!(cfg.validate_additional_constraints().is_err());

        let mut cfg = base_config();
        cfg.order_scan_days = 0;
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn additional_constraints_reject_malformed_overrides() {
        let mut cfg = base_config();
        cfg.sku_overrides = Some("ABC=12,broken".to_string());
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.sku_overrides = Some("ABC=12, DEF=34".to_string());
        assert!(cfg.validate_additional_constraints().is_ok());
    }
}
