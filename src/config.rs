use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_for_the_procurement_api_only";

/// Entity store configuration
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// JSON snapshot file. When unset the store is purely in-memory.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// Settings for the server, the CLI and the sweeper, validated on load.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Profile name (`development`, `test`, `production`, ...)
    pub environment: String,

    /// Default filter for the `procurement_api` target; `RUST_LOG` wins
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    /// HS256 signing secret for actor tokens
    #[validate(length(min = 32), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    #[serde(default = "default_jwt_audience")]
    pub jwt_audience: String,

    /// Token lifetime in seconds
    #[serde(default = "default_jwt_expiration_secs")]
    #[validate(range(min = 60, max = 604800))]
    pub jwt_expiration_secs: u64,

    /// Capacity of the transition event channel feeding notifications
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Notifications kept per recipient before the oldest are dropped
    #[serde(default = "default_notification_inbox_capacity")]
    #[validate(range(min = 1, max = 100000))]
    pub notification_inbox_capacity: usize,

    /// Currency assumed by reports when none is given
    #[serde(default = "default_currency")]
    #[validate(custom = "validate_currency")]
    pub default_currency: String,

    /// Interval of the deadline/overdue sweeper
    #[serde(default = "default_sweep_interval_secs")]
    #[validate(range(min = 1))]
    pub sweep_interval_secs: u64,

    /// `per_page` when a list request omits it
    #[serde(default = "default_api_page_size")]
    pub api_default_page_size: u32,

    #[serde(default = "default_api_max_page_size")]
    pub api_max_page_size: u32,

    /// Comma-separated origins for the dashboard
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Opt-in to `Access-Control-Allow-Origin: *` outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Built-in defaults around the four values that have none.
    pub fn new(jwt_secret: String, host: String, port: u16, environment: String) -> Self {
        Self {
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            jwt_secret,
            jwt_issuer: default_jwt_issuer(),
            jwt_audience: default_jwt_audience(),
            jwt_expiration_secs: default_jwt_expiration_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            notification_inbox_capacity: default_notification_inbox_capacity(),
            default_currency: default_currency(),
            sweep_interval_secs: default_sweep_interval_secs(),
            api_default_page_size: default_api_page_size(),
            api_max_page_size: default_api_max_page_size(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            store: StoreConfig::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn auth_config(&self) -> crate::auth::AuthConfig {
        crate::auth::AuthConfig::new(
            self.jwt_secret.clone(),
            self.jwt_issuer.clone(),
            self.jwt_audience.clone(),
            std::time::Duration::from_secs(self.jwt_expiration_secs),
        )
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            errors.add(
                "cors_allowed_origins",
                invalid(
                    "cors_allowed_origins_required",
                    "outside development set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true",
                ),
            );
        }
        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            errors.add(
                "jwt_secret",
                invalid(
                    "jwt_secret_default_dev",
                    "the bundled development secret only works with environment=development",
                ),
            );
        }
        if self.api_default_page_size == 0 || self.api_default_page_size > self.api_max_page_size {
            errors.add(
                "api_default_page_size",
                invalid(
                    "api_default_page_size",
                    "api_default_page_size must be between 1 and api_max_page_size",
                ),
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Runs derive validation plus the cross-field checks
    pub fn validate_all(&self) -> Result<(), AppConfigError> {
        self.validate()
            .and_then(|()| self.validate_additional_constraints())
            .map_err(|e| {
                error!(errors = ?e, "invalid configuration");
                AppConfigError::Validation(e)
            })
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("cannot load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_jwt_issuer() -> String {
    "procurement-api".to_string()
}

fn default_jwt_audience() -> String {
    "procurement-dashboard".to_string()
}

fn default_jwt_expiration_secs() -> u64 {
    3600
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_notification_inbox_capacity() -> usize {
    crate::notifications::DEFAULT_INBOX_CAPACITY
}

fn default_currency() -> String {
    "MXN".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

fn default_api_page_size() -> u32 {
    20
}

fn default_api_max_page_size() -> u32 {
    100
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(invalid(
            "log_level",
            "log_level must be trace, debug, info, warn or error",
        )),
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Length is checked by the derive; this rejects placeholders and guessable secrets.
fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    const PLACEHOLDERS: [&str; 3] = [
        "CHANGE_THIS_SECRET_IN_PRODUCTION",
        "your-secret-key",
        "default-secret-key",
    ];
    const WEAK_FRAGMENTS: [&str; 3] = ["changeme", "password", "12345"];

    let secret = secret.trim();
    let lower = secret.to_ascii_lowercase();
    let single_char = secret
        .chars()
        .next()
        .map_or(false, |first| secret.chars().all(|c| c == first));

    if secret.len() < 32 {
        Err(invalid("jwt_secret", "jwt_secret needs at least 32 characters"))
    } else if PLACEHOLDERS.iter().any(|p| secret.eq_ignore_ascii_case(p)) {
        Err(invalid("jwt_secret", "jwt_secret is still a placeholder value"))
    } else if single_char || WEAK_FRAGMENTS.iter().any(|f| lower.contains(f)) {
        Err(invalid("jwt_secret", "jwt_secret is too easy to guess"))
    } else {
        Ok(())
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        return Err(invalid(
            "event_channel_capacity",
            "event_channel_capacity must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_currency(code: &str) -> Result<(), ValidationError> {
    if crate::models::is_valid_currency(code) {
        Ok(())
    } else {
        Err(invalid(
            "default_currency",
            "default_currency must be a 3-letter uppercase ISO-4217 code",
        ))
    }
}

/// Installs the global subscriber. Repeated calls are no-ops.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("procurement_api={},tower_http=debug", level);
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

/// Reads `config/default.toml`, then `config/{RUN_ENV}.toml`, then `APP__*`
/// variables, each layer overriding the previous one, and validates the result.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] but reads the TOML layers from `config_dir`.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!(profile = %run_env, dir = %config_dir.display(), "loading configuration");
    if !config_dir.exists() {
        info!("configuration directory missing; using defaults and APP__* variables only");
    }

    // jwt_secret has no default; it must come from a file or APP__JWT_SECRET.
    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("no jwt_secret configured; set APP__JWT_SECRET");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret (set APP__JWT_SECRET)".into(),
        )));
    }

    let cfg: AppConfig = config.try_deserialize()?;
    cfg.validate_all()?;

    info!(environment = %cfg.environment, port = cfg.port, "configuration loaded");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn production() -> AppConfig {
        AppConfig::new(
            "a_reasonably_long_and_unique_signing_secret_value".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn production_needs_cors_origins_or_opt_in() {
        let mut cfg = production();
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.cors_allowed_origins = Some("https://compras.example.com".into());
        assert!(cfg.validate_additional_constraints().is_ok());

        cfg.cors_allowed_origins = Some(" , ".into());
        cfg.cors_allow_any_origin = true;
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn development_is_permissive() {
        let mut cfg = production();
        cfg.environment = "Development".into();
        assert!(cfg.should_allow_permissive_cors());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn bundled_secret_only_in_development() {
        let mut cfg = production();
        cfg.cors_allow_any_origin = true;
        cfg.jwt_secret = DEV_DEFAULT_JWT_SECRET.into();
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn default_page_size_fits_the_ceiling() {
        let mut cfg = production();
        cfg.cors_allow_any_origin = true;
        cfg.api_default_page_size = 500;
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn jwt_secret_rules() {
        assert!(validate_jwt_secret("short").is_err());
        assert!(validate_jwt_secret(&"x".repeat(40)).is_err());
        assert!(validate_jwt_secret("my-password-is-long-enough-to-pass-length").is_err());
        assert!(validate_jwt_secret("k9-QzT4r-83vn-Lp0a-Ww2e-Hs7u-Jd1c-Xy").is_ok());
    }

    #[test]
    fn derive_validation_catches_bad_values() {
        let mut cfg = AppConfig::new(
            "k9-QzT4r-83vn-Lp0a-Ww2e-Hs7u-Jd1c-Xy".into(),
            "127.0.0.1".into(),
            8080,
            "development".into(),
        );
        assert!(cfg.validate().is_ok());

        cfg.event_channel_capacity = 0;
        cfg.default_currency = "usd".into();
        cfg.log_level = "loud".into();
        let errors = cfg.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("event_channel_capacity"));
        assert!(fields.contains_key("default_currency"));
        assert!(fields.contains_key("log_level"));
    }

    #[test]
    fn loads_layers_from_directory() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
            jwt_secret = "k9-QzT4r-83vn-Lp0a-Ww2e-Hs7u-Jd1c-Xy"
            port = 9090
            sweep_interval_secs = 30

            [store]
            snapshot_path = "/tmp/procurement-snapshot.json"
            "#
        )
        .unwrap();

        let cfg = load_config_from(dir.path()).unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.sweep_interval_secs, 30);
        assert_eq!(
            cfg.store.snapshot_path.as_deref(),
            Some(Path::new("/tmp/procurement-snapshot.json"))
        );
    }
}
