//! # Sync Configuration
//!
//! Settings for the sync service. Loaded in three layers, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional YAML file (`--config`)
//! 3. environment variables (after `.env` is loaded with `dotenvy`)
//!
//! The resulting struct is passed explicitly to everything that needs it; core
//! logic never reads the environment on its own.

use crate::controller::reconciler::PassSettings;
use crate::error::ConfigError;
use crate::provider::DeviceTarget;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A credential that is wiped on drop and never printed
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub roster: RosterConfig,
    pub device: DeviceConfig,
    pub sync: ScheduleConfig,
    pub server: ServerConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
    /// Problems found while loading, logged once tracing is up
    #[serde(skip)]
    pub load_warnings: Vec<String>,
}

/// Where the roster comes from. Exactly one of `url` and `file`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RosterConfig {
    /// Roster HTTP endpoint
    pub url: Option<String>,
    /// Local JSON roster, re-read every pass
    pub file: Option<PathBuf>,
    /// Sent verbatim as the `Authorization` header
    pub authorization: Option<Secret>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Base URL of the device gateway, e.g. `http://192.168.1.20`
    pub host: Option<String>,
    pub username: String,
    pub password: Secret,
    /// Devices addressed through the gateway
    pub targets: Vec<TargetConfig>,
    /// Users requested per search page
    pub page_size: u32,
    /// Fixed values sent with every enrollment
    pub enrollment: EnrollmentDefaults,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            host: None,
            username: "admin".to_string(),
            password: Secret::default(),
            targets: Vec::new(),
            page_size: DEFAULT_DEVICE_PAGE_SIZE,
            enrollment: EnrollmentDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Defaults to the device index
    pub name: Option<String>,
    pub dev_index: String,
    /// Overrides `device.host` for this target
    pub host: Option<String>,
    /// Device whose user list feeds the diff
    pub primary: bool,
}

/// Fields the device requires on enrollment that the roster does not carry
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EnrollmentDefaults {
    pub user_type: String,
    pub gender: String,
    pub local_ui_right: bool,
    pub begin_time: String,
    pub end_time: String,
    pub time_type: String,
    pub door_right: String,
    pub door_no: u32,
    pub plan_template_no: String,
    pub user_verify_mode: String,
}

impl Default for EnrollmentDefaults {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            user_type: "normal".to_string(),
            gender: "male".to_string(),
            local_ui_right: false,
            begin_time: DEFAULT_VALID_BEGIN_TIME.to_string(),
            end_time: DEFAULT_VALID_END_TIME.to_string(),
            time_type: "local".to_string(),
            door_right: "1".to_string(),
            door_no: 1,
            plan_template_no: "1".to_string(),
            user_verify_mode: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Delay between the end of one pass and the start of the next (seconds)
    pub poll_interval_secs: u64,
    /// Items applied at once within a phase
    pub max_concurrent_operations: usize,
    /// Per-request timeout for roster and device calls (seconds)
    pub request_timeout_secs: u64,
    /// Run a pass immediately instead of waiting one interval
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_concurrent_operations: DEFAULT_MAX_CONCURRENT_OPERATIONS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: crate::constants::DEFAULT_METRICS_PORT,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Telemetry endpoint receiving the pass counters
    pub webhook_url: Option<String>,
    pub webhook_token: Option<Secret>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            format: "json".to_string(),
        }
    }
}

/// A missing `.env` is normal. Anything else is worth a warning.
fn dotenv_warning<T>(result: Result<T, dotenvy::Error>) -> Option<String> {
    match result {
        Ok(_) => None,
        Err(e) if e.not_found() => None,
        Err(e) => Some(format!("Ignoring unreadable .env file: {e}")),
    }
}

impl SyncConfig {
    /// Load defaults, then `path` if given, then `.env` and the process environment
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or the result is invalid
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.load_warnings.extend(dotenv_warning(dotenvy::dotenv()));
        config.apply_overrides(&|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns an error if the file cannot be read or is not valid YAML
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply environment overrides read through `env`
    pub fn apply_overrides(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        if let Some(url) = env("ROSTER_URL") {
            self.roster.url = Some(url);
        }
        if let Some(file) = env("ROSTER_FILE") {
            self.roster.file = Some(PathBuf::from(file));
        }
        if let Some(authorization) = env("ROSTER_AUTH") {
            self.roster.authorization = Some(Secret::new(authorization));
        }

        if let Some(host) = env("DEVICE_HOST") {
            self.device.host = Some(host);
        }
        self.device.username = env_var_or_default_str(env, "DEVICE_USERNAME", &self.device.username);
        if let Some(password) = env("DEVICE_PASSWORD") {
            self.device.password = Secret::new(password);
        }
        if let Some(indexes) = env("DEVICE_INDEXES") {
            self.device.targets = targets_from_indexes(&indexes);
        }
        self.device.page_size = env_var_or_default(env, "DEVICE_PAGE_SIZE", self.device.page_size);

        self.sync.poll_interval_secs =
            env_var_or_default(env, "POLL_INTERVAL_SECS", self.sync.poll_interval_secs);
        self.sync.max_concurrent_operations = env_var_or_default(
            env,
            "MAX_CONCURRENT_OPERATIONS",
            self.sync.max_concurrent_operations,
        );
        self.sync.request_timeout_secs =
            env_var_or_default(env, "REQUEST_TIMEOUT_SECS", self.sync.request_timeout_secs);
        self.sync.run_on_start = env_var_or_default_bool(env, "RUN_ON_START", self.sync.run_on_start);

        self.server.port = env_var_or_default(env, "METRICS_PORT", self.server.port);

        if let Some(url) = env("REPORT_WEBHOOK_URL") {
            self.report.webhook_url = Some(url);
        }
        if let Some(token) = env("REPORT_WEBHOOK_TOKEN") {
            self.report.webhook_token = Some(Secret::new(token));
        }

        self.logging.level = env_var_or_default_str(env, "LOG_LEVEL", &self.logging.level);
        self.logging.format = env_var_or_default_str(env, "LOG_FORMAT", &self.logging.format);
    }

    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        match (&self.roster.url, &self.roster.file) {
            (None, None) => return invalid("no roster source: set roster.url or roster.file"),
            (Some(_), Some(_)) => return invalid("roster.url and roster.file are mutually exclusive"),
            _ => {}
        }
        if self.device.host.as_deref().is_none_or(|h| h.trim().is_empty()) {
            return invalid("device.host is required");
        }
        if self.device.targets.is_empty() {
            return invalid("at least one device target is required");
        }
        if self.device.targets.iter().any(|t| t.dev_index.trim().is_empty()) {
            return invalid("device target with empty dev_index");
        }
        if self.device.targets.iter().filter(|t| t.primary).count() > 1 {
            return invalid("more than one device target is marked primary");
        }
        if self.device.page_size == 0 {
            return invalid("device.page_size must be greater than zero");
        }
        if self.sync.max_concurrent_operations == 0 {
            return invalid("sync.max_concurrent_operations must be greater than zero");
        }
        if self.sync.request_timeout_secs == 0 {
            return invalid("sync.request_timeout_secs must be greater than zero");
        }
        if self.sync.poll_interval_secs == 0 {
            return invalid("sync.poll_interval_secs must be greater than zero");
        }
        if !matches!(self.logging.format.to_ascii_lowercase().as_str(), "json" | "text") {
            return invalid("logging.format must be 'json' or 'text'");
        }
        Ok(())
    }

    /// Device targets with names resolved
    pub fn targets(&self) -> Vec<DeviceTarget> {
        self.device
            .targets
            .iter()
            .map(|t| DeviceTarget {
                name: t.name.clone().unwrap_or_else(|| t.dev_index.clone()),
                dev_index: t.dev_index.clone(),
                host: t.host.clone(),
                primary: t.primary,
            })
            .collect()
    }

    pub fn pass_settings(&self) -> PassSettings {
        PassSettings {
            max_concurrent_operations: self.sync.max_concurrent_operations,
            request_timeout: self.request_timeout(),
        }
    }

    /// Get poll interval duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.poll_interval_secs)
    }

    /// Get request timeout duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_secs)
    }
}

/// `DEVICE_INDEXES=A1,B2` → two targets, the first one primary
fn targets_from_indexes(indexes: &str) -> Vec<TargetConfig> {
    indexes
        .split(',')
        .map(str::trim)
        .filter(|index| !index.is_empty())
        .enumerate()
        .map(|(position, index)| TargetConfig {
            name: None,
            dev_index: index.to_string(),
            host: None,
            primary: position == 0,
        })
        .collect()
}

/// Read environment variable or return default value
fn env_var_or_default<T: FromStr>(env: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    env(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(env: &dyn Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    env(key)
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(env: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    env(key).unwrap_or_else(|| default.to_string())
}
