//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The config file
//! is optional — an operator can run the service from environment
//! variables alone, which is how the original deployment works.
//!
//! Invalid numeric values never abort startup: non-numeric or
//! non-positive minutes fall back to the documented default with a
//! configuration warning. An operator typo must not silently disable the
//! auto-pause safety net.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use autopause::{DEFAULT_THRESHOLD_MINUTES, Thresholds};
use common::Secret;
use serde::Deserialize;
use tracing::{info, warn};

/// Default scheduler period in minutes.
pub const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 60;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Initial account session
#[derive(Debug, Default, Deserialize)]
pub struct AccountConfig {
    /// Initial token; overridden by LEIGOD_TOKEN
    #[serde(default)]
    pub token: Option<String>,
}

/// Poll cadence and auto-pause thresholds
#[derive(Debug, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u64,
    #[serde(default = "default_threshold")]
    pub warning_threshold_minutes: u64,
    #[serde(default = "default_threshold")]
    pub pause_threshold_minutes: u64,
}

/// Push notification settings
#[derive(Debug, Default, Deserialize)]
pub struct NotifyConfig {
    /// ServerChan send key; overridden by SERVERCHAN_SENDKEY. Empty or
    /// absent disables push notifications.
    #[serde(default)]
    pub sendkey: Option<String>,
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8000".parse().expect("static default address")
}

fn default_max_connections() -> usize {
    1000
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_MINUTES
}

fn default_threshold() -> u64 {
    DEFAULT_THRESHOLD_MINUTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: default_check_interval(),
            warning_threshold_minutes: default_threshold(),
            pause_threshold_minutes: default_threshold(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            account: AccountConfig::default(),
            monitor: MonitorConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file (if present), then overlay
    /// environment variables and repair invalid values.
    pub fn load(path: &Path) -> common::Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&contents)?
        } else {
            info!(path = %path.display(), "config file not found, using defaults and environment");
            Config::default()
        };

        config.apply_env();
        config.repair();

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("control-panel.toml")
    }

    /// Overlay the recognized environment variables.
    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("LEIGOD_TOKEN") {
            self.account.token = Some(token);
        }
        if let Ok(key) = std::env::var("SERVERCHAN_SENDKEY") {
            self.notify.sendkey = Some(key);
        }
        self.monitor.check_interval_minutes = env_minutes(
            "CHECK_INTERVAL_MINUTES",
            self.monitor.check_interval_minutes,
        );
        self.monitor.warning_threshold_minutes = env_minutes(
            "WARNING_THRESHOLD_MINUTES",
            self.monitor.warning_threshold_minutes,
        );
        self.monitor.pause_threshold_minutes = env_minutes(
            "PAUSE_THRESHOLD_MINUTES",
            self.monitor.pause_threshold_minutes,
        );
    }

    /// Replace non-positive minute values with the documented defaults.
    fn repair(&mut self) {
        if self.monitor.check_interval_minutes == 0 {
            warn!(
                default = DEFAULT_CHECK_INTERVAL_MINUTES,
                "check_interval_minutes must be positive, using default"
            );
            self.monitor.check_interval_minutes = DEFAULT_CHECK_INTERVAL_MINUTES;
        }
        if self.monitor.warning_threshold_minutes == 0 {
            warn!(
                default = DEFAULT_THRESHOLD_MINUTES,
                "warning_threshold_minutes must be positive, using default"
            );
            self.monitor.warning_threshold_minutes = DEFAULT_THRESHOLD_MINUTES;
        }
        if self.monitor.pause_threshold_minutes == 0 {
            warn!(
                default = DEFAULT_THRESHOLD_MINUTES,
                "pause_threshold_minutes must be positive, using default"
            );
            self.monitor.pause_threshold_minutes = DEFAULT_THRESHOLD_MINUTES;
        }
    }

    /// Scheduler period.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.check_interval_minutes * 60)
    }

    /// Auto-pause thresholds.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            warning_minutes: self.monitor.warning_threshold_minutes,
            pause_minutes: self.monitor.pause_threshold_minutes,
        }
    }

    /// Initial session token, if one is configured and non-empty.
    pub fn initial_token(&self) -> Option<Secret<String>> {
        self.account
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Secret::new(t.to_string()))
    }

    /// ServerChan send key, if one is configured.
    pub fn sendkey(&self) -> Option<Secret<String>> {
        self.notify
            .sendkey
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| Secret::new(k.to_string()))
    }
}

/// Read a positive minutes value from the environment, keeping `current`
/// on absent, non-numeric, or non-positive values (with a warning for the
/// latter two).
fn env_minutes(name: &str, current: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => value,
            _ => {
                warn!(var = name, value = %raw, "invalid minutes value, keeping {current}");
                current
            }
        },
        Err(_) => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "LEIGOD_TOKEN",
        "SERVERCHAN_SENDKEY",
        "CHECK_INTERVAL_MINUTES",
        "WARNING_THRESHOLD_MINUTES",
        "PAUSE_THRESHOLD_MINUTES",
        "CONFIG_PATH",
    ];

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn clear_all() {
        for var in ALL_VARS {
            unsafe { std::env::remove_var(var) };
        }
    }

    fn valid_toml() -> &'static str {
        r#"
[server]
listen_addr = "127.0.0.1:9000"

[account]
token = "file-token"

[monitor]
check_interval_minutes = 30
warning_threshold_minutes = 120
pause_threshold_minutes = 240

[notify]
sendkey = "SCTKEY"
"#
    }

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control-panel.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_all() };
        let (_dir, path) = write_config(valid_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.monitor.check_interval_minutes, 30);
        assert_eq!(config.thresholds().warning_minutes, 120);
        assert_eq!(config.thresholds().pause_minutes, 240);
        assert_eq!(config.initial_token().unwrap().expose(), "file-token");
        assert_eq!(config.sendkey().unwrap().expose(), "SCTKEY");
        assert_eq!(config.check_interval(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_all() };

        let config = Config::load(Path::new("/nonexistent/control-panel.toml")).unwrap();
        assert_eq!(config.monitor.check_interval_minutes, 60);
        assert_eq!(config.thresholds().warning_minutes, 1440);
        assert_eq!(config.thresholds().pause_minutes, 1440);
        assert!(config.initial_token().is_none());
        assert!(config.sendkey().is_none());
        assert_eq!(config.server.listen_addr.port(), 8000);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_all() };
        let (_dir, path) = write_config("not valid {{{{ toml");

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_all() };
        let (_dir, path) = write_config(valid_toml());

        unsafe {
            set_env("LEIGOD_TOKEN", "env-token");
            set_env("CHECK_INTERVAL_MINUTES", "15");
            set_env("PAUSE_THRESHOLD_MINUTES", "300");
            set_env("SERVERCHAN_SENDKEY", "ENVKEY");
        }
        let config = Config::load(&path).unwrap();
        unsafe { clear_all() };

        assert_eq!(config.initial_token().unwrap().expose(), "env-token");
        assert_eq!(config.monitor.check_interval_minutes, 15);
        assert_eq!(config.thresholds().pause_minutes, 300);
        assert_eq!(config.thresholds().warning_minutes, 120, "file value kept");
        assert_eq!(config.sendkey().unwrap().expose(), "ENVKEY");
    }

    #[test]
    fn non_numeric_env_minutes_fall_back() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_all() };

        unsafe {
            set_env("CHECK_INTERVAL_MINUTES", "soon");
            set_env("WARNING_THRESHOLD_MINUTES", "-5");
            set_env("PAUSE_THRESHOLD_MINUTES", "1.5");
        }
        let config = Config::load(Path::new("/nonexistent/control-panel.toml")).unwrap();
        unsafe { clear_all() };

        assert_eq!(config.monitor.check_interval_minutes, 60);
        assert_eq!(config.thresholds().warning_minutes, 1440);
        assert_eq!(
            config.thresholds().pause_minutes,
            1440,
            "invalid pause threshold falls back to the default, it does not disable auto-pause"
        );
    }

    #[test]
    fn zero_minutes_in_file_are_repaired() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_all() };
        let (_dir, path) = write_config(
            r#"
[monitor]
check_interval_minutes = 0
warning_threshold_minutes = 0
pause_threshold_minutes = 0
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.monitor.check_interval_minutes, 60);
        assert_eq!(config.thresholds().warning_minutes, 1440);
        assert_eq!(config.thresholds().pause_minutes, 1440);
    }

    #[test]
    fn empty_token_and_sendkey_count_as_absent() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_all() };
        let (_dir, path) = write_config(
            r#"
[account]
token = "  "

[notify]
sendkey = ""
"#,
        );

        let config = Config::load(&path).unwrap();
        assert!(config.initial_token().is_none());
        assert!(config.sendkey().is_none());
    }

    #[test]
    fn zero_max_connections_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_all() };
        let (_dir, path) = write_config(
            r#"
[server]
listen_addr = "127.0.0.1:8000"
max_connections = 0
"#,
        );

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_all() };
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        unsafe { clear_all() };
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
    }

    #[test]
    fn resolve_path_env_then_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_all() };
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        assert_eq!(Config::resolve_path(None), PathBuf::from("/env/path.toml"));
        unsafe { clear_all() };
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("control-panel.toml")
        );
    }
}
