//! Device profile listing.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ProfileView {
    name: String,
    address: String,
    timeout_ms: u64,
    retry_ms: u64,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Timeout")]
    timeout: String,
    #[tabled(rename = "Retry")]
    retry: String,
}

impl From<&ProfileView> for ProfileRow {
    fn from(p: &ProfileView) -> Self {
        let marker = if p.default { " *" } else { "" };
        Self {
            name: format!("{}{marker}", p.name),
            address: p.address.clone(),
            timeout: format!("{}ms", p.timeout_ms),
            retry: format!("{}ms", p.retry_ms),
        }
    }
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let active = config::active_device_name(global, &cfg);

    let views: Vec<ProfileView> = cfg
        .device_names()
        .into_iter()
        .filter_map(|name| {
            let profile = cfg.devices.get(name)?;
            Some(ProfileView {
                name: name.to_owned(),
                address: profile.address.clone(),
                timeout_ms: profile.timeout_ms.unwrap_or(cfg.defaults.timeout_ms),
                retry_ms: profile.retry_ms.unwrap_or(cfg.defaults.retry_ms),
                default: name == active,
            })
        })
        .collect();

    if views.is_empty() && !global.quiet {
        eprintln!(
            "No device profiles configured. Add [devices.<name>] to {}",
            config::config_path().display()
        );
        return Ok(());
    }

    let out = output::render_list(&global.output, &views, ProfileRow::from, |p| {
        p.name.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
