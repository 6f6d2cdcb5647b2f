// ── Domain model ──
//
// Documents exchanged with the device plus local preference documents.

pub mod effects;
pub mod settings;
pub mod site;
pub mod statistics;

pub use effects::{Effect, EffectList};
pub use settings::{
    Configuration, SettingRow, SettingSpec, SettingValue, coerce_value, join_settings,
};
pub use site::{EffectOptions, EffectSettings, SiteOptions, TypedOption, default_effect_options};
pub use statistics::{DeviceStatistics, Sample, StatisticsHistory};
