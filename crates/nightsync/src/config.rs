//! CLI configuration: thin wrapper around `nightsync_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--device, --address, --timeout-ms).

use nightsync_config::ConfigError;
use nightsync_core::ControllerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use nightsync_config::{Config, DeviceProfile, config_path, load_config_or_default};

// ── CLI-specific helpers ────────────────────────────────────────────

/// A resolved device: how to reach it and what to call it in messages.
#[derive(Debug)]
pub struct Target {
    pub config: ControllerConfig,
    pub label: String,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_device_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .device
        .clone()
        .or_else(|| config.default_device.clone())
        .unwrap_or_else(|| "default".into())
}

/// Translate the active profile + global flags into a `ControllerConfig`.
///
/// CLI flag overrides take priority over profile values. With
/// `--address` an unknown profile name is not an error.
pub fn resolve_target(global: &GlobalOpts, config: &Config) -> Result<Target, CliError> {
    let name = active_device_name(global, config);

    let mut profile = match config.profile(&name) {
        Ok(profile) => profile,
        Err(ConfigError::UnknownDevice { .. }) if global.address.is_some() => {
            DeviceProfile::default()
        }
        Err(ConfigError::UnknownDevice { name }) => {
            let names = config.device_names();
            let available = if names.is_empty() {
                "(none)".into()
            } else {
                names.join(", ")
            };
            return Err(CliError::ProfileNotFound {
                name,
                available,
                path: config_path().display().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(ref address) = global.address {
        profile.address.clone_from(address);
    }
    if let Some(timeout_ms) = global.timeout_ms {
        profile.timeout_ms = Some(timeout_ms);
    }

    let controller_config =
        nightsync_config::profile_to_controller_config(&profile, &config.defaults)?;
    let label = controller_config
        .device
        .as_ref()
        .map_or_else(|| name.clone(), ToString::to_string);

    Ok(Target {
        config: controller_config,
        label,
    })
}
