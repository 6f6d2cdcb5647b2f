//! Device settings command handlers.

use std::sync::Arc;

use tabled::Tabled;
use tracing::warn;

use nightsync_core::model::coerce_value;
use nightsync_core::{
    Configuration, SettingRow, SettingSpec, SettingValue, StoreName, WriteOutcome, join_settings,
};

use super::Context;
use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SettingTableRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    type_name: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl From<&SettingRow> for SettingTableRow {
    fn from(r: &SettingRow) -> Self {
        Self {
            key: r.key.clone(),
            name: r.spec.as_ref().map(|s| s.label().to_owned()).unwrap_or_default(),
            type_name: r
                .spec
                .as_ref()
                .map(|s| s.type_name.clone())
                .unwrap_or_default(),
            value: r.value.to_string(),
        }
    }
}

/// Type name implied by a value when the device has no spec for it.
fn inferred_type(value: &SettingValue) -> &'static str {
    match value {
        SettingValue::Bool(_) => "boolean",
        SettingValue::Int(_) => "int",
        SettingValue::Float(_) => "float",
        SettingValue::Text(_) | SettingValue::Other(_) => "string",
    }
}

/// Specs are descriptive only; a failed fetch leaves them empty.
async fn specs(ctx: &mut Context) -> Arc<Vec<SettingSpec>> {
    match ctx
        .fetch::<Vec<SettingSpec>>(StoreName::ConfigurationSpecs)
        .await
    {
        Ok(specs) => specs,
        Err(e) => {
            warn!(error = %e, "setting descriptions unavailable");
            Arc::new(Vec::new())
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn show(ctx: &mut Context, global: &GlobalOpts) -> Result<(), CliError> {
    let config = ctx.fetch::<Configuration>(StoreName::Configuration).await?;
    let specs = specs(ctx).await;
    let rows = join_settings(&config, &specs);
    let out = output::render_list(&global.output, &rows, SettingTableRow::from, |r| {
        format!("{}={}", r.key, r.value)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn set(
    ctx: &mut Context,
    key: &str,
    raw: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let config = ctx.fetch::<Configuration>(StoreName::Configuration).await?;
    let current = config.get(key).ok_or_else(|| CliError::NotFound {
        resource_type: "setting".into(),
        identifier: key.into(),
        list_command: "settings".into(),
    })?;

    let specs = specs(ctx).await;
    let value = match specs.iter().find(|s| s.name == key) {
        Some(spec) => spec.coerce(raw)?,
        None => coerce_value(key, inferred_type(current), raw)?,
    };

    let outcome = ctx
        .device(&[StoreName::Configuration])
        .update_setting(key, value)
        .await?;

    let message = match outcome {
        WriteOutcome::Skipped => format!("{key} unchanged"),
        WriteOutcome::Acknowledged(ack) => match ack.get(key) {
            Some(v) => format!("{key} = {v}"),
            None => format!("{key} written"),
        },
    };
    if !global.quiet {
        eprintln!("{message}");
    }
    Ok(())
}
