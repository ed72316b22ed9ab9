//! Inline widgets holding user-editable node state.

use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::error::LibraryError;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ControlKind {
    Text,
    Number,
    Toggle,
    Select { options: Vec<String> },
    /// Free-form value, used for structured or hidden node state.
    Json,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Control {
    pub key: String,
    pub label: String,
    pub kind: ControlKind,
    value: Value,
}

impl Control {
    pub fn new(key: &str, label: &str, kind: ControlKind, value: Value) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            kind,
            value,
        }
    }

    pub fn text(key: &str, label: &str, initial: &str) -> Self {
        Self::new(key, label, ControlKind::Text, Value::from(initial))
    }

    pub fn number(key: &str, label: &str, initial: f64) -> Self {
        Self::new(key, label, ControlKind::Number, Value::from(initial))
    }

    pub fn toggle(key: &str, label: &str, initial: bool) -> Self {
        Self::new(key, label, ControlKind::Toggle, Value::from(initial))
    }

    pub fn select(key: &str, label: &str, options: &[&str], initial: &str) -> Self {
        Self::new(
            key,
            label,
            ControlKind::Select {
                options: options.iter().map(|o| o.to_string()).collect(),
            },
            Value::from(initial),
        )
    }

    pub fn json(key: &str, label: &str, initial: Value) -> Self {
        Self::new(key, label, ControlKind::Json, initial)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Replace the value, checking it against the control kind.
    pub fn set_value(&mut self, value: Value) -> Result<(), LibraryError> {
        let accepted = match &self.kind {
            ControlKind::Text => matches!(value, Value::String(_)),
            ControlKind::Number => matches!(value, Value::Number(_) | Value::Integer(_)),
            ControlKind::Toggle => matches!(value, Value::Boolean(_)),
            ControlKind::Select { options } => value
                .as_str()
                .is_some_and(|s| options.iter().any(|o| o == s)),
            ControlKind::Json => true,
        };
        if !accepted {
            return Err(LibraryError::invalid(format!(
                "Value {} is not valid for control '{}' ({:?})",
                value, self.key, self.kind
            )));
        }
        self.value = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_checks_kind() {
        let mut count = Control::number("count", "Count", 3.0);
        assert!(count.set_value(Value::Integer(5)).is_ok());
        assert!(count.set_value(Value::from("five")).is_err());
        assert_eq!(count.value(), &Value::Integer(5));

        let mut op = Control::select("operator", "Operator", &[">", "<"], ">");
        assert!(op.set_value(Value::from("<")).is_ok());
        assert!(op.set_value(Value::from("==")).is_err());
    }
}
