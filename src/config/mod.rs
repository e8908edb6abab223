use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Production backend the mobile clients ship with.
pub const DEFAULT_BASE_URL: &str = "https://drive-test-3bee5c1b0f36.herokuapp.com";

/// Distinguishes runtime behavior for different stages of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the client.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub poll: PollConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let base_url = env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();
        let timeout = duration_var("HTTP_TIMEOUT_SECS", 30)?;

        let profile_path = env::var("PROFILE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("slotscout.profile.json"));

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            api: ApiConfig { base_url, timeout },
            storage: StorageConfig { profile_path },
            poll: PollConfig::load()?,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Settings for the remote booking API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

/// Location of the single persisted profile blob.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub profile_path: PathBuf,
}

/// Timers governing the availability poller and the task watchers.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Gap between background availability checks.
    pub background_interval: Duration,
    /// Shortened gap armed after a failed check.
    pub retry_delay: Duration,
    /// Minimum gap between user-triggered refreshes.
    pub refresh_cooldown: Duration,
    /// Gap between status probes for a running availability job.
    pub task_poll_interval: Duration,
    /// Gap between status probes while a login task runs.
    pub login_poll_interval: Duration,
    /// Login status probes before the attempt is abandoned.
    pub login_max_attempts: u32,
    /// Local hours `[start, end)` during which no jobs are submitted.
    pub quiet_hours: Option<(u32, u32)>,
}

impl PollConfig {
    fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            background_interval: duration_var("POLL_INTERVAL_SECS", 15 * 60)?,
            retry_delay: duration_var("POLL_RETRY_SECS", 5 * 60)?,
            refresh_cooldown: duration_var("REFRESH_COOLDOWN_SECS", 5 * 60)?,
            task_poll_interval: duration_var("TASK_POLL_SECS", 5)?,
            login_poll_interval: duration_var("LOGIN_POLL_SECS", 5)?,
            login_max_attempts: parse_var("LOGIN_MAX_ATTEMPTS", 48)?,
            quiet_hours: quiet_hours_var()?,
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

fn duration_var(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    parse_var(name, default_secs).map(Duration::from_secs)
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name }),
        Err(_) => Ok(default),
    }
}

/// `QUIET_HOURS` is `start-end` in local 24h time, or `off`. Defaults to `0-6`,
/// matching the backend's overnight maintenance window.
fn quiet_hours_var() -> Result<Option<(u32, u32)>, ConfigError> {
    let raw = match env::var("QUIET_HOURS") {
        Ok(raw) => raw,
        Err(_) => return Ok(Some((0, 6))),
    };

    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("off") || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    let (start, end) = raw
        .split_once('-')
        .ok_or(ConfigError::InvalidQuietHours)?;
    let start: u32 = start.trim().parse().map_err(|_| ConfigError::InvalidQuietHours)?;
    let end: u32 = end.trim().parse().map_err(|_| ConfigError::InvalidQuietHours)?;
    if start > 23 || end > 24 || start >= end {
        return Err(ConfigError::InvalidQuietHours);
    }

    Ok(Some((start, end)))
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { name: &'static str },
    InvalidQuietHours,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { name } => {
                write!(f, "{name} must be a non-negative integer")
            }
            ConfigError::InvalidQuietHours => {
                write!(f, "QUIET_HOURS must be 'start-end' within 0-24, or 'off'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_LOG_LEVEL",
            "API_BASE_URL",
            "HTTP_TIMEOUT_SECS",
            "PROFILE_PATH",
            "POLL_INTERVAL_SECS",
            "POLL_RETRY_SECS",
            "REFRESH_COOLDOWN_SECS",
            "TASK_POLL_SECS",
            "LOGIN_POLL_SECS",
            "LOGIN_MAX_ATTEMPTS",
            "QUIET_HOURS",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.timeout, Duration::from_secs(30));
        assert_eq!(config.poll.background_interval, Duration::from_secs(900));
        assert_eq!(config.poll.login_max_attempts, 48);
        assert_eq!(config.poll.quiet_hours, Some((0, 6)));
    }

    #[test]
    fn trailing_slash_is_stripped_from_base_url() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("API_BASE_URL", "http://localhost:9000/");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.api.base_url, "http://localhost:9000");
        env::remove_var("API_BASE_URL");
    }

    #[test]
    fn quiet_hours_can_be_disabled() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("QUIET_HOURS", "off");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.poll.quiet_hours, None);
        env::remove_var("QUIET_HOURS");
    }

    #[test]
    fn malformed_quiet_hours_are_rejected() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("QUIET_HOURS", "6");
        let err = AppConfig::load().expect_err("range without dash rejected");
        assert!(matches!(err, ConfigError::InvalidQuietHours));
        env::remove_var("QUIET_HOURS");
    }
}
