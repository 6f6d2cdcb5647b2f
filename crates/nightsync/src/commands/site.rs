//! Site option command handlers.
//!
//! Site options are local preferences; no device is contacted.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use nightsync_core::{SettingValue, SiteOptions, StoreName};

use super::Context;
use crate::cli::{GlobalOpts, SiteArgs, SiteCommand};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct SiteView {
    key: String,
    name: String,
    type_name: String,
    value: SettingValue,
}

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    type_name: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl From<&SiteView> for SiteRow {
    fn from(v: &SiteView) -> Self {
        Self {
            key: v.key.clone(),
            name: v.name.clone(),
            type_name: v.type_name.clone(),
            value: v.value.to_string(),
        }
    }
}

fn views(site: &SiteOptions) -> Vec<SiteView> {
    site.iter()
        .map(|(key, option)| SiteView {
            key: key.clone(),
            name: option.name.clone(),
            type_name: option.type_name.clone(),
            value: option.value.clone(),
        })
        .collect()
}

pub async fn handle(ctx: &Context, args: SiteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = ctx.device(&[StoreName::SiteSettings]);
    let current = device
        .current::<SiteOptions>(StoreName::SiteSettings)?
        .unwrap_or_else(|| Arc::new(SiteOptions::default()));

    match args.command.unwrap_or(SiteCommand::Show) {
        SiteCommand::Show => {
            let out = output::render_list(&global.output, &views(&current), SiteRow::from, |v| {
                format!("{}={}", v.key, v.value)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SiteCommand::Set { key, value } => {
            let mut site = current.as_ref().clone();
            site.set_from_str(&key, &value)?;
            device
                .update(StoreName::SiteSettings, serde_json::to_value(&site)?)
                .await?;
            if !global.quiet {
                if let Some(option) = site.get(&key) {
                    eprintln!("{key} = {}", option.value);
                }
            }
            Ok(())
        }
    }
}
