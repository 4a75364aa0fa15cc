//! Raw cell values as read from a store.
//!
//! [`CellValue`] is the closed set of shapes a target cell can take. Stores
//! map their native representation onto it during the scan, and the
//! normalizer only ever sees these variants.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
    Other(serde_json::Value),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// Values that carry nothing to normalize: null, empty text, zero, false.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(n) => *n == 0.0 || n.is_nan(),
            CellValue::Boolean(b) => !b,
            CellValue::Other(_) => false,
        }
    }

    /// Canonical string form. `None` when the value has no textual
    /// representation (structured objects).
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => Some(String::new()),
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(format_number(*n)),
            CellValue::Boolean(b) => Some(b.to_string()),
            CellValue::Other(value) => json_as_text(value),
        }
    }

    /// Like [`CellValue::as_text`], falling back to an empty string.
    pub fn to_text(&self) -> String {
        self.as_text().unwrap_or_default()
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn json_as_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => Some(String::new()),
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(match n.as_f64() {
            Some(f) => format_number(f),
            None => n.to_string(),
        }),
        serde_json::Value::Array(items) => {
            let parts = items
                .iter()
                .map(json_as_text)
                .collect::<Option<Vec<_>>>()?;
            Some(parts.join(","))
        }
        serde_json::Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_values_follow_falsy_rules() {
        assert!(CellValue::Null.is_blank());
        assert!(CellValue::text("").is_blank());
        assert!(CellValue::Number(0.0).is_blank());
        assert!(CellValue::Number(-0.0).is_blank());
        assert!(CellValue::Number(f64::NAN).is_blank());
        assert!(CellValue::Boolean(false).is_blank());

        assert!(!CellValue::text(" ").is_blank());
        assert!(!CellValue::Number(1.0).is_blank());
        assert!(!CellValue::Boolean(true).is_blank());
        assert!(!CellValue::Other(json!([])).is_blank());
    }

    #[test]
    fn numbers_render_without_trailing_fraction() {
        assert_eq!(CellValue::Number(42.0).to_text(), "42");
        assert_eq!(CellValue::Number(-3.5).to_text(), "-3.5");
        assert_eq!(CellValue::Number(f64::INFINITY).to_text(), "Infinity");
        assert_eq!(CellValue::Number(f64::NAN).to_text(), "NaN");
    }

    #[test]
    fn other_values_render_arrays_and_reject_objects() {
        let list = CellValue::Other(json!(["A@x.io", 2, true]));
        assert_eq!(list.as_text().as_deref(), Some("A@x.io,2,true"));

        let object = CellValue::Other(json!({ "email": "a@b.c" }));
        assert_eq!(object.as_text(), None);
        assert_eq!(object.to_text(), "");

        let nested = CellValue::Other(json!(["a", { "b": 1 }]));
        assert_eq!(nested.as_text(), None);
    }

    #[test]
    fn option_converts_to_null_when_absent() {
        assert_eq!(CellValue::from(None::<&str>), CellValue::Null);
        assert_eq!(CellValue::from(Some("x")), CellValue::text("x"));
    }
}
