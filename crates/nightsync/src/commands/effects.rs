//! Effect list and navigation command handlers.

use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use nightsync_core::timing::progress_percent;
use nightsync_core::{EffectList, StoreName};

use super::Context;
use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Views ───────────────────────────────────────────────────────────

/// One effect as the CLI presents it.
#[derive(Debug, Serialize)]
pub struct EffectView {
    pub index: usize,
    pub name: String,
    pub display_name: String,
    pub enabled: bool,
    pub core: bool,
    pub active: bool,
    /// Progress of the running effect at fetch time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

#[derive(Tabled)]
struct EffectRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Core")]
    core: String,
    #[tabled(rename = "Active")]
    active: String,
}

impl From<&EffectView> for EffectRow {
    fn from(v: &EffectView) -> Self {
        let active = match (v.active, v.progress) {
            (true, Some(pct)) => format!("▶ {pct:.0}%"),
            (true, None) => "▶".into(),
            (false, _) => String::new(),
        };
        Self {
            index: v.index,
            name: v.display_name.clone(),
            enabled: if v.enabled { "yes" } else { "no" }.into(),
            core: if v.core { "yes" } else { "" }.into(),
            active,
        }
    }
}

pub fn views(list: &EffectList) -> Vec<EffectView> {
    let progress = list.remaining().map(|ms| {
        progress_percent(
            Duration::from_millis(ms),
            Duration::from_millis(list.effect_interval),
        )
    });
    list.effects
        .iter()
        .zip(list.display_names())
        .enumerate()
        .map(|(index, (effect, display_name))| {
            let active = list.is_selected(index);
            EffectView {
                index,
                name: effect.name.clone(),
                display_name,
                enabled: effect.enabled,
                core: effect.core,
                active,
                progress: progress.filter(|_| active),
            }
        })
        .collect()
}

fn not_found(index: usize) -> CliError {
    CliError::NotFound {
        resource_type: "effect".into(),
        identifier: index.to_string(),
        list_command: "effects".into(),
    }
}

fn done(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("{message}");
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(ctx: &mut Context, global: &GlobalOpts) -> Result<(), CliError> {
    let list = ctx.fetch::<EffectList>(StoreName::Effects).await?;
    let views = views(&list);
    let out = output::render_list(&global.output, &views, EffectRow::from, |v| {
        v.display_name.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn navigate(ctx: &Context, up: bool, global: &GlobalOpts) -> Result<(), CliError> {
    ctx.device(&[StoreName::Effects]).navigate(up).await?;
    done(
        global,
        if up {
            "Switched to next effect"
        } else {
            "Switched to previous effect"
        },
    );
    Ok(())
}

pub async fn goto(ctx: &mut Context, index: usize, global: &GlobalOpts) -> Result<(), CliError> {
    let list = ctx.fetch::<EffectList>(StoreName::Effects).await?;
    let name = list.display_name(index).ok_or_else(|| not_found(index))?;
    ctx.device(&[StoreName::Effects]).navigate_to(index).await?;
    done(global, &format!("Switched to {name}"));
    Ok(())
}

/// Enable (`Some(true)`), disable (`Some(false)`), or flip (`None`) an effect.
pub async fn set_enabled(
    ctx: &mut Context,
    index: usize,
    target: Option<bool>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let list = ctx.fetch::<EffectList>(StoreName::Effects).await?;
    let effect = list.effects.get(index).ok_or_else(|| not_found(index))?;
    let enable = target.unwrap_or(!effect.enabled);
    let name = list.display_name(index).unwrap_or_else(|| effect.name.clone());

    ctx.device(&[StoreName::Effects])
        .toggle_effect(index, !enable)
        .await?;
    done(
        global,
        &format!("{} {name}", if enable { "Enabled" } else { "Disabled" }),
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn views_mark_running_effect() {
        let list: EffectList = serde_json::from_value(json!({
            "currentEffect": 1,
            "millisecondsRemaining": 2500,
            "effectInterval": 10000,
            "Effects": [
                { "name": "Fire", "enabled": true },
                { "name": "Fire", "enabled": false, "core": true }
            ]
        }))
        .unwrap();

        let views = views(&list);
        assert_eq!(views[0].display_name, "Fire_1");
        assert!(!views[0].active);
        assert!(views[0].progress.is_none());
        assert!(views[1].active);
        assert!((views[1].progress.unwrap() - 75.0).abs() < 1e-9);

        let row = EffectRow::from(&views[1]);
        assert_eq!(row.active, "▶ 75%");
        assert_eq!(row.core, "yes");
    }
}
