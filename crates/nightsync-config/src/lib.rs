//! Shared configuration for NightSync front ends.
//!
//! TOML device profiles, environment overrides, and translation to
//! `nightsync_core::ControllerConfig`. The CLI layers its flag overrides
//! on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use nightsync_api::DeviceAddress;
use nightsync_core::{ControllerConfig, RetryPolicy};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no device profile named '{name}'")]
    UnknownDevice { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when no `--device` is given.
    pub default_device: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub devices: HashMap<String, DeviceProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_device: Some("default".into()),
            defaults: Defaults::default(),
            devices: HashMap::new(),
        }
    }
}

impl Config {
    /// The profile called `name`, or the implicit locally hosted device
    /// when `name` is the default and nothing is configured for it.
    pub fn profile(&self, name: &str) -> Result<DeviceProfile, ConfigError> {
        if let Some(profile) = self.devices.get(name) {
            return Ok(profile.clone());
        }
        if self.default_device.as_deref() == Some(name) {
            return Ok(DeviceProfile::default());
        }
        Err(ConfigError::UnknownDevice { name: name.into() })
    }

    /// Profile names in sorted order.
    pub fn device_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.devices.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Per-request deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Pause between fetch retries in milliseconds.
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout_ms: default_timeout_ms(),
            retry_ms: default_retry_ms(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout_ms() -> u64 {
    3000
}
fn default_retry_ms() -> u64 {
    3000
}

/// A named device.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// Base URL (e.g. "http://192.168.1.42"), or "current" for the
    /// device hosting the panel.
    #[serde(default = "default_address")]
    pub address: String,

    /// Override the default request timeout.
    pub timeout_ms: Option<u64>,

    /// Override the default retry delay.
    pub retry_ms: Option<u64>,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout_ms: None,
            retry_ms: None,
        }
    }
}

fn default_address() -> String {
    "current".into()
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "nightsync", "nightsync")
}

/// `config.toml` under the platform config directory.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where site and effect preferences persist between runs.
pub fn session_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("session.json"),
        |dirs| dirs.data_dir().join("session.json"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("nightsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment.
///
/// Environment keys use `__` as the nesting separator, e.g.
/// `NIGHTSYNC_DEFAULTS__TIMEOUT_MS=500`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NIGHTSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is missing or broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Write `cfg` to [`config_path()`].
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ControllerConfig` from a profile and the global defaults.
///
/// Suitable for long-running consumers: both pollers are on and site
/// preferences persist to [`session_path()`].
pub fn profile_to_controller_config(
    profile: &DeviceProfile,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    let device = DeviceAddress::parse(&profile.address).map_err(|e| ConfigError::Validation {
        field: "address".into(),
        reason: format!("{}: {e}", profile.address),
    })?;

    let timeout_ms = profile.timeout_ms.unwrap_or(defaults.timeout_ms);
    if timeout_ms == 0 {
        return Err(ConfigError::Validation {
            field: "timeout_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }
    let retry_ms = profile.retry_ms.unwrap_or(defaults.retry_ms);

    Ok(ControllerConfig {
        device: Some(device),
        request_timeout: Duration::from_millis(timeout_ms),
        retry: RetryPolicy {
            delay: Duration::from_millis(retry_ms),
            max_attempts: None,
        },
        session_path: Some(session_path()),
        ..ControllerConfig::default()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_device.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.timeout_ms, 3000);
        assert!(cfg.devices.is_empty());
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_device = "porch"

[defaults]
timeout_ms = 1500

[devices.porch]
address = "http://192.168.1.42"
retry_ms = 500
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.default_device.as_deref(), Some("porch"));
        assert_eq!(cfg.defaults.timeout_ms, 1500);
        assert_eq!(cfg.defaults.output, "table");

        let porch = cfg.profile("porch").unwrap();
        assert_eq!(porch.address, "http://192.168.1.42");
        assert_eq!(porch.retry_ms, Some(500));
        assert_eq!(cfg.device_names(), vec!["porch"]);
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.devices.insert(
            "desk".into(),
            DeviceProfile {
                address: "http://10.0.0.7".into(),
                timeout_ms: Some(800),
                retry_ms: None,
            },
        );

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.devices, cfg.devices);
    }

    #[test]
    fn default_profile_is_implicit_current_device() {
        let cfg = Config::default();
        let profile = cfg.profile("default").unwrap();
        assert_eq!(profile.address, "current");
        assert!(matches!(
            cfg.profile("attic"),
            Err(ConfigError::UnknownDevice { .. })
        ));
    }

    #[test]
    fn profile_translation_applies_overrides() {
        let profile = DeviceProfile {
            address: "http://192.168.1.42".into(),
            timeout_ms: None,
            retry_ms: Some(250),
        };
        let defaults = Defaults {
            timeout_ms: 1200,
            ..Defaults::default()
        };

        let config = profile_to_controller_config(&profile, &defaults).unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(1200));
        assert_eq!(config.retry.delay, Duration::from_millis(250));
        assert!(matches!(config.device, Some(DeviceAddress::Remote(_))));
        assert!(config.session_path.is_some());
    }

    #[test]
    fn profile_translation_rejects_bad_values() {
        let bad_address = DeviceProfile {
            address: "not a url".into(),
            ..DeviceProfile::default()
        };
        assert!(matches!(
            profile_to_controller_config(&bad_address, &Defaults::default()),
            Err(ConfigError::Validation { .. })
        ));

        let zero_timeout = DeviceProfile {
            timeout_ms: Some(0),
            ..DeviceProfile::default()
        };
        assert!(matches!(
            profile_to_controller_config(&zero_timeout, &Defaults::default()),
            Err(ConfigError::Validation { .. })
        ));
    }
}
