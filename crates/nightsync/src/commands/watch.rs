//! Live view: effect changes, progress, statistics, and device errors.
//!
//! Runs with the pollers on until Ctrl-C. `--output json` emits one
//! compact JSON object per event for scripting.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;

use nightsync_core::{
    DeviceStatistics, EffectList, ErrorNotice, SiteOptions, StatisticsHistory, StoreName,
    channel,
};

use super::Context;
use super::stats::display_value;
use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

/// Progress is printed each time it crosses a multiple of this.
const PROGRESS_STEP: f64 = 10.0;

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum WatchEvent {
    Effect {
        index: usize,
        name: String,
    },
    Progress {
        percent: f64,
    },
    Statistics {
        at: DateTime<Utc>,
        values: serde_json::Map<String, serde_json::Value>,
        samples: usize,
        capacity: usize,
    },
    Error(ErrorNotice),
}

struct Printer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Printer {
    fn emit(&self, event: &WatchEvent) -> Result<(), CliError> {
        let line = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(event, true)?,
            OutputFormat::Table | OutputFormat::Plain => self.human(event),
        };
        if matches!(event, WatchEvent::Error(_)) {
            eprintln!("{line}");
        } else {
            output::print_output(&line, self.quiet);
        }
        Ok(())
    }

    fn human(&self, event: &WatchEvent) -> String {
        match event {
            WatchEvent::Effect { index, name } => {
                let text = format!("▶ [{index}] {name}");
                if self.color {
                    text.bold().to_string()
                } else {
                    text
                }
            }
            WatchEvent::Progress { percent } => format!("  {percent:5.1}%"),
            WatchEvent::Statistics {
                at,
                values,
                samples,
                capacity,
            } => {
                let pairs: Vec<String> = values
                    .iter()
                    .map(|(k, v)| format!("{k}={}", display_value(v)))
                    .collect();
                let stamp = at.format("%H:%M:%S").to_string();
                let stamp = if self.color {
                    stamp.dimmed().to_string()
                } else {
                    stamp
                };
                format!("{stamp} {} ({samples}/{capacity})", pairs.join(" "))
            }
            WatchEvent::Error(notice) => {
                let text = notice.to_string();
                if self.color {
                    text.red().to_string()
                } else {
                    text
                }
            }
        }
    }
}

/// Values of `keys` in `stats`, or every numeric value when `keys` is empty.
fn selected_values(
    stats: &DeviceStatistics,
    keys: &[String],
) -> serde_json::Map<String, serde_json::Value> {
    if keys.is_empty() {
        stats
            .iter()
            .filter(|(_, v)| v.is_number())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    } else {
        keys.iter()
            .filter_map(|k| stats.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

/// Index of the progress bucket `percent` falls in.
fn bucket(percent: f64) -> i32 {
    (0..=10)
        .rev()
        .find(|step| percent >= f64::from(*step) * PROGRESS_STEP)
        .unwrap_or(0)
}

pub async fn run(ctx: &mut Context, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let printer = Printer {
        format: global.output.clone(),
        color: output::should_color(&global.color),
        quiet: global.quiet,
    };
    let controller = ctx.controller.clone();

    let capacity = controller
        .device(&[StoreName::SiteSettings])
        .current::<SiteOptions>(StoreName::SiteSettings)?
        .map_or(50, |site| site.max_samples());
    let mut history = StatisticsHistory::new(capacity);

    let mut effects = controller
        .device(&[StoreName::Effects])
        .subscribe::<EffectList>(StoreName::Effects)?;
    let (_stats_id, mut statistics) = controller.bus().listen(channel::STATISTICS);
    let mut progress = controller.effect_progress(args.slot).await?;
    let mut last_effect: Option<usize> = None;
    let mut last_bucket: Option<i32> = None;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,

            changed = effects.changed() => match changed {
                None => break,
                Some(Some(list)) => {
                    if last_effect != Some(list.current_effect) {
                        last_effect = Some(list.current_effect);
                        last_bucket = None;
                        let name = list
                            .display_name(list.current_effect)
                            .unwrap_or_default();
                        printer.emit(&WatchEvent::Effect { index: list.current_effect, name })?;
                    }
                }
                Some(None) => {}
            },

            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let percent = *progress.borrow_and_update();
                let step = bucket(percent);
                if last_bucket != Some(step) {
                    last_bucket = Some(step);
                    printer.emit(&WatchEvent::Progress { percent })?;
                }
            }

            Some(payload) = statistics.recv() => {
                let Some(json) = payload.as_json() else { continue };
                let stats: DeviceStatistics = serde_json::from_value(json.clone())?;
                let at = Utc::now();
                let values = selected_values(&stats, &args.keys);
                history.push(at, Arc::new(stats));
                printer.emit(&WatchEvent::Statistics {
                    at,
                    values,
                    samples: history.len(),
                    capacity: history.capacity(),
                })?;
            }

            Some(payload) = ctx.errors.recv() => {
                if let Some(notice) = payload.as_error() {
                    printer.emit(&WatchEvent::Error(notice.clone()))?;
                }
            }
        }
    }
    Ok(())
}
