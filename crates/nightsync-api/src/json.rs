// JSON parse guard
//
// Device firmware occasionally answers with truncated or empty bodies.
// Parsing never panics: callers always get a tagged result and decide
// whether to retry.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Why a payload was rejected.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The text is not structurally valid JSON.
    #[error("invalid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    /// The document parsed to `null`.
    #[error("payload is empty")]
    Absent,

    /// Valid JSON that does not match the expected shape.
    #[error("unexpected payload shape: {message}")]
    Shape { message: String },
}

/// Parse `text` into `T`, accepting any document that is not `null`.
pub fn parse<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    parse_with(text, |value| !value.is_null())
}

/// Parse `text` into `T` after checking the raw document against `guard`.
///
/// The guard sees the untyped document so it can reject payloads that
/// would deserialize but are semantically wrong for the caller.
pub fn parse_with<T, G>(text: &str, guard: G) -> Result<T, ParseError>
where
    T: DeserializeOwned,
    G: Fn(&Value) -> bool,
{
    let value: Value = serde_json::from_str(text).map_err(ParseError::Syntax)?;

    if !guard(&value) {
        return Err(if value.is_null() {
            ParseError::Absent
        } else {
            ParseError::Shape {
                message: "rejected by validator".into(),
            }
        });
    }

    serde_json::from_value(value).map_err(|e| ParseError::Shape {
        message: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
    }

    #[test]
    fn parses_valid_document() {
        let sample: Sample = parse(r#"{"name":"Rainbow"}"#).unwrap();
        assert_eq!(sample.name, "Rainbow");
    }

    #[test]
    fn truncated_document_is_syntax_error() {
        let result = parse::<Value>("{");
        assert!(matches!(result, Err(ParseError::Syntax(_))));
    }

    #[test]
    fn empty_body_is_syntax_error() {
        assert!(matches!(parse::<Value>(""), Err(ParseError::Syntax(_))));
    }

    #[test]
    fn null_is_absent() {
        assert!(matches!(parse::<Value>("null"), Err(ParseError::Absent)));
    }

    #[test]
    fn wrong_shape_is_tagged() {
        let result = parse::<Sample>(r#"{"title":"x"}"#);
        assert!(matches!(result, Err(ParseError::Shape { .. })));
    }

    #[test]
    fn custom_guard_can_reject() {
        let result = parse_with::<Value, _>("[]", Value::is_object);
        match result {
            Err(ParseError::Shape { message }) => assert!(message.contains("validator")),
            other => panic!("expected shape error, got {other:?}"),
        }
    }
}
