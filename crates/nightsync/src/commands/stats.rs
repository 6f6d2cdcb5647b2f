//! Statistics command handler.

use serde_json::Value;

use nightsync_core::{DeviceStatistics, StoreName};

use super::Context;
use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Statistics render strings without JSON quotes.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub async fn show(ctx: &mut Context, global: &GlobalOpts) -> Result<(), CliError> {
    let stats = ctx.fetch::<DeviceStatistics>(StoreName::Statistics).await?;
    let out = output::render_single(
        &global.output,
        stats.as_ref(),
        |s| output::render_pairs(s.iter().map(|(k, v)| (k.as_str(), display_value(v)))),
        |s| {
            s.iter()
                .map(|(k, v)| format!("{k}={}", display_value(v)))
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
