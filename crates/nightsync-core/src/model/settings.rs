// ── Device configuration ──
//
// `GET /settings` returns a flat document of scalar values and
// `GET /settings/specs` returns field metadata. The two are fetched
// independently and joined by key when displayed.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Other(Value),
}

impl fmt::Display for SettingValue {
    /// Renders the way a form field carries the value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for SettingValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for SettingValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

/// The device's configuration document, in device key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(IndexMap<String, SettingValue>);

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.0.get(key)
    }

    /// Set `key`, keeping its position if it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.0.iter()
    }

    /// Overlay every key of `patch` onto this document.
    pub fn merge(&mut self, patch: Configuration) {
        for (key, value) in patch.0 {
            self.0.insert(key, value);
        }
    }

    /// One form field per key, values rendered as text.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect()
    }
}

impl FromIterator<(String, SettingValue)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, SettingValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Metadata describing one configuration key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingSpec {
    pub name: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub type_name: String,
    /// Fields the UI does not interpret (descriptions, validation hints).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl SettingSpec {
    /// Convert user-entered text into a value of this field's type.
    pub fn coerce(&self, raw: &str) -> Result<SettingValue, CoreError> {
        coerce_value(&self.name, &self.type_name, raw)
    }

    pub fn label(&self) -> &str {
        if self.friendly_name.is_empty() {
            &self.name
        } else {
            &self.friendly_name
        }
    }
}

/// Convert `raw` according to a `typeName`.
///
/// `int` and `PositiveBigInteger` become integers, `float` a float,
/// `boolean` a bool; any other type is kept as text.
pub fn coerce_value(field: &str, type_name: &str, raw: &str) -> Result<SettingValue, CoreError> {
    let raw = raw.trim();
    let invalid = |reason: &str| CoreError::InvalidValue {
        field: field.to_owned(),
        reason: format!("{reason}: {raw:?}"),
    };
    match type_name {
        "int" | "PositiveBigInteger" => raw
            .parse::<i64>()
            .map(SettingValue::Int)
            .map_err(|_| invalid("expected an integer")),
        "float" => raw
            .parse::<f64>()
            .map(SettingValue::Float)
            .map_err(|_| invalid("expected a number")),
        "boolean" => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Ok(SettingValue::Bool(true)),
            "false" | "0" | "off" | "no" => Ok(SettingValue::Bool(false)),
            _ => Err(invalid("expected true or false")),
        },
        _ => Ok(SettingValue::Text(raw.to_owned())),
    }
}

/// A configuration entry paired with its metadata, if the specs have it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingRow {
    pub key: String,
    pub value: SettingValue,
    pub spec: Option<SettingSpec>,
}

/// Join values with specs by key, in configuration order.
///
/// Specs may lag the configuration; keys without metadata are kept with
/// `spec: None`.
pub fn join_settings(config: &Configuration, specs: &[SettingSpec]) -> Vec<SettingRow> {
    config
        .iter()
        .map(|(key, value)| SettingRow {
            key: key.clone(),
            value: value.clone(),
            spec: specs.iter().find(|s| &s.name == key).cloned(),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn config() -> Configuration {
        serde_json::from_value(json!({
            "brightness": 200,
            "effectInterval": 30000,
            "powerLimit": 4.5,
            "rememberCurrentEffect": true,
            "location": "Berkeley"
        }))
        .unwrap()
    }

    #[test]
    fn values_keep_their_types() {
        let cfg = config();
        assert_eq!(cfg.get("brightness"), Some(&SettingValue::Int(200)));
        assert_eq!(cfg.get("powerLimit"), Some(&SettingValue::Float(4.5)));
        assert_eq!(
            cfg.get("rememberCurrentEffect"),
            Some(&SettingValue::Bool(true))
        );
    }

    #[test]
    fn form_fields_follow_document_order() {
        let fields = config().form_fields();
        assert_eq!(fields[0], ("brightness".into(), "200".into()));
        assert_eq!(fields[2], ("powerLimit".into(), "4.5".into()));
        assert_eq!(fields[3], ("rememberCurrentEffect".into(), "true".into()));
        assert_eq!(fields[4], ("location".into(), "Berkeley".into()));
    }

    #[test]
    fn merge_keeps_position() {
        let mut cfg = config();
        let mut patch = Configuration::new();
        patch.insert("effectInterval", 15000_i64);
        cfg.merge(patch);
        assert_eq!(cfg.iter().nth(1).unwrap().0, "effectInterval");
        assert_eq!(cfg.get("effectInterval"), Some(&SettingValue::Int(15000)));
    }

    #[test]
    fn coercion_by_type_name() {
        assert_eq!(
            coerce_value("n", "int", "42").unwrap(),
            SettingValue::Int(42)
        );
        assert_eq!(
            coerce_value("n", "PositiveBigInteger", "7").unwrap(),
            SettingValue::Int(7)
        );
        assert_eq!(
            coerce_value("n", "float", "0.5").unwrap(),
            SettingValue::Float(0.5)
        );
        assert_eq!(
            coerce_value("n", "boolean", "off").unwrap(),
            SettingValue::Bool(false)
        );
        assert_eq!(
            coerce_value("n", "String", "42").unwrap(),
            SettingValue::Text("42".into())
        );
        assert!(matches!(
            coerce_value("brightness", "int", "bright"),
            Err(CoreError::InvalidValue { .. })
        ));
    }

    #[test]
    fn join_tolerates_missing_specs() {
        let specs: Vec<SettingSpec> = serde_json::from_value(json!([
            { "name": "brightness", "friendlyName": "Brightness", "typeName": "int" }
        ]))
        .unwrap();
        let rows = join_settings(&config(), &specs);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].spec.as_ref().unwrap().label(), "Brightness");
        assert!(rows[1].spec.is_none());
    }
}
