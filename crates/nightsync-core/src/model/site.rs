// ── Local preferences ──
//
// Site options and per-effect display options live only on this host.
// They are persisted to session storage, never sent to the device.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::settings::{SettingValue, coerce_value};
use crate::error::CoreError;

pub const STATS_REFRESH_RATE: &str = "statsRefreshRate";
pub const STATS_ANIMATE_CHANGE: &str = "statsAnimateChange";
pub const MAX_SAMPLES: &str = "maxSamples";
pub const UI_MODE: &str = "UIMode";

/// Default image shown for an effect without stored options.
pub const EFFECT_IMAGE: &str = "Effect Image";

/// A named, typed preference value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedOption {
    pub name: String,
    pub type_name: String,
    pub value: SettingValue,
}

impl TypedOption {
    pub fn new(name: &str, type_name: &str, value: impl Into<SettingValue>) -> Self {
        Self {
            name: name.to_owned(),
            type_name: type_name.to_owned(),
            value: value.into(),
        }
    }
}

/// Site-wide preferences keyed by option id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteOptions(IndexMap<String, TypedOption>);

impl Default for SiteOptions {
    fn default() -> Self {
        let mut options = IndexMap::new();
        options.insert(
            STATS_REFRESH_RATE.to_owned(),
            TypedOption::new("Refresh rate", "int", 3_i64),
        );
        options.insert(
            STATS_ANIMATE_CHANGE.to_owned(),
            TypedOption::new("Animate chart", "boolean", false),
        );
        options.insert(
            MAX_SAMPLES.to_owned(),
            TypedOption::new("Chart points", "int", 50_i64),
        );
        options.insert(
            UI_MODE.to_owned(),
            TypedOption::new("UI Mode", "string", "dark"),
        );
        Self(options)
    }
}

impl SiteOptions {
    pub fn get(&self, key: &str) -> Option<&TypedOption> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypedOption)> {
        self.0.iter()
    }

    /// Replace the value of an existing option, converting from text.
    pub fn set_from_str(&mut self, key: &str, raw: &str) -> Result<(), CoreError> {
        let option = self.0.get_mut(key).ok_or_else(|| CoreError::InvalidValue {
            field: key.to_owned(),
            reason: "unknown site option".into(),
        })?;
        option.value = coerce_value(key, &option.type_name, raw)?;
        Ok(())
    }

    fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key).map(|o| &o.value) {
            Some(SettingValue::Int(i)) => Some(*i),
            Some(SettingValue::Text(s)) => s.parse().ok(),
            _ => None,
        }
    }

    /// Seconds between statistics fetches (at least one).
    pub fn stats_refresh_rate(&self) -> u64 {
        self.int(STATS_REFRESH_RATE)
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(3)
            .max(1)
    }

    /// Rolling statistics window size (at least one).
    pub fn max_samples(&self) -> usize {
        self.int(MAX_SAMPLES)
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(50)
            .max(1)
    }

    pub fn animate_change(&self) -> bool {
        matches!(
            self.0.get(STATS_ANIMATE_CHANGE).map(|o| &o.value),
            Some(SettingValue::Bool(true))
        )
    }

    pub fn ui_mode(&self) -> &str {
        match self.0.get(UI_MODE).map(|o| &o.value) {
            Some(SettingValue::Text(mode)) => mode,
            _ => "dark",
        }
    }
}

/// Display options for one effect.
pub type EffectOptions = IndexMap<String, TypedOption>;

/// Per-effect display options keyed by effect display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectSettings(IndexMap<String, EffectOptions>);

impl EffectSettings {
    /// Stored options for `display_name`, or the default image option.
    pub fn options_for(&self, display_name: &str) -> EffectOptions {
        self.0
            .get(display_name)
            .cloned()
            .unwrap_or_else(default_effect_options)
    }

    pub fn set(&mut self, display_name: impl Into<String>, options: EffectOptions) {
        self.0.insert(display_name.into(), options);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn default_effect_options() -> EffectOptions {
    let mut options = IndexMap::new();
    options.insert(
        EFFECT_IMAGE.to_owned(),
        TypedOption::new(EFFECT_IMAGE, "url", "./favicon.ico"),
    );
    options
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_match_panel() {
        let site = SiteOptions::default();
        assert_eq!(site.stats_refresh_rate(), 3);
        assert_eq!(site.max_samples(), 50);
        assert!(!site.animate_change());
        assert_eq!(site.ui_mode(), "dark");

        let value = serde_json::to_value(&site).unwrap();
        assert_eq!(value["statsRefreshRate"]["typeName"], "int");
        assert_eq!(value["UIMode"]["value"], "dark");
    }

    #[test]
    fn set_from_str_coerces() {
        let mut site = SiteOptions::default();
        site.set_from_str(STATS_REFRESH_RATE, "10").unwrap();
        site.set_from_str(STATS_ANIMATE_CHANGE, "true").unwrap();
        assert_eq!(site.stats_refresh_rate(), 10);
        assert!(site.animate_change());
        assert!(site.set_from_str("nope", "1").is_err());
        assert!(site.set_from_str(MAX_SAMPLES, "many").is_err());
    }

    #[test]
    fn zero_refresh_rate_is_clamped() {
        let mut site = SiteOptions::default();
        site.set_from_str(STATS_REFRESH_RATE, "0").unwrap();
        assert_eq!(site.stats_refresh_rate(), 1);
    }

    #[test]
    fn effect_options_fall_back_to_image() {
        let mut settings: EffectSettings = serde_json::from_value(json!({
            "Fire": { "Speed": { "name": "Speed", "typeName": "int", "value": 4 } }
        }))
        .unwrap();
        assert!(settings.options_for("Fire").contains_key("Speed"));

        let fallback = settings.options_for("Rainbow_2");
        assert_eq!(
            fallback[EFFECT_IMAGE].value,
            SettingValue::Text("./favicon.ico".into())
        );

        settings.set("Rainbow_2", EffectOptions::new());
        assert!(settings.options_for("Rainbow_2").is_empty());
    }
}
