//! Typed property declarations
//!
//! Each resource kind declares its properties as an ordered table of
//! [`PropertySpec`]. The table is the setter table: assigning a value means
//! looking the name up and running the spec's coercion, so unknown names and
//! invalid values fail before anything touches the system.

use serde::Serialize;
use serde_json::Value;

/// Additional validation run after type coercion
pub type Validator = fn(&Value) -> Result<(), String>;

/// Value type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    String,
    Boolean,
    Integer,
    /// Unix permission bits, normalized to a four-digit octal string
    FileMode,
    /// List of strings; a single string is wrapped
    StringList,
    Map,
    Any,
    /// One of a fixed set of strings
    Enum(&'static [&'static str]),
}

/// How a property participates in reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyRole {
    /// Names the resource (path, package name); read back but never synced
    Identity,
    /// Tunes how changes are made; never read back
    Parameter,
    /// Observable state compared and synced during evaluation
    State,
}

/// Declaration of a single property
#[derive(Debug, Clone, Serialize)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub role: PropertyRole,
    /// Value emitted when the property is neither set nor observable
    pub placeholder: Value,
    #[serde(skip)]
    pub validator: Option<Validator>,
}

impl PropertySpec {
    fn new(name: &'static str, kind: PropertyKind, role: PropertyRole) -> Self {
        Self {
            name,
            kind,
            role,
            placeholder: Value::Null,
            validator: None,
        }
    }

    pub fn identity(name: &'static str) -> Self {
        Self::new(name, PropertyKind::String, PropertyRole::Identity)
    }

    pub fn state(name: &'static str, kind: PropertyKind) -> Self {
        Self::new(name, kind, PropertyRole::State)
    }

    pub fn parameter(name: &'static str, kind: PropertyKind) -> Self {
        Self::new(name, kind, PropertyRole::Parameter)
    }

    pub fn with_placeholder(mut self, placeholder: Value) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn is_state(&self) -> bool {
        self.role == PropertyRole::State
    }

    /// Validate and normalize a value for this property
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        let coerced = coerce_kind(self.kind, value)?;
        if let Some(validate) = self.validator {
            validate(&coerced)?;
        }
        Ok(coerced)
    }

    /// Whether an observed value satisfies a desired one
    pub fn insync(&self, current: Option<&Value>, desired: &Value) -> bool {
        let Some(current) = current else {
            return desired.is_null();
        };

        match self.kind {
            // Observed modes may come back unnormalized from a provider
            PropertyKind::FileMode => match coerce_kind(self.kind, current.clone()) {
                Ok(normalized) => normalized == *desired,
                Err(_) => false,
            },
            PropertyKind::StringList => {
                let (Some(have), Some(want)) = (current.as_array(), desired.as_array()) else {
                    return current == desired;
                };
                have.len() == want.len() && want.iter().all(|w| have.contains(w))
            }
            _ => current == desired,
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

fn coerce_kind(kind: PropertyKind, value: Value) -> Result<Value, String> {
    match kind {
        PropertyKind::Any => Ok(value),
        PropertyKind::String => match value {
            Value::String(_) => Ok(value),
            other => Err(format!("expected a string, got {}", type_name(&other))),
        },
        PropertyKind::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(Value::Bool(true)),
                "false" | "no" => Ok(Value::Bool(false)),
                _ => Err(format!("expected a boolean, got '{s}'")),
            },
            other => Err(format!("expected a boolean, got {}", type_name(other))),
        },
        PropertyKind::Integer => match &value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected an integer, got '{s}'")),
            other => Err(format!("expected an integer, got {}", type_name(other))),
        },
        PropertyKind::FileMode => {
            let bits = match &value {
                Value::Number(n) => n
                    .as_u64()
                    .ok_or_else(|| format!("invalid mode {n}"))?,
                Value::String(s) => {
                    let digits = s.trim();
                    if digits.is_empty() || !digits.chars().all(|c| ('0'..='7').contains(&c)) {
                        return Err(format!("invalid octal mode '{s}'"));
                    }
                    u64::from_str_radix(digits, 8).map_err(|e| format!("invalid mode '{s}': {e}"))?
                }
                other => return Err(format!("expected a mode, got {}", type_name(other))),
            };
            if bits > 0o7777 {
                return Err(format!("mode {bits:o} is out of range"));
            }
            Ok(Value::String(format!("{bits:04o}")))
        }
        PropertyKind::StringList => match value {
            Value::String(s) => Ok(Value::Array(vec![Value::String(s)])),
            Value::Array(items) => {
                if let Some(bad) = items.iter().find(|v| !v.is_string()) {
                    return Err(format!("expected a list of strings, found {}", type_name(bad)));
                }
                Ok(Value::Array(items))
            }
            other => Err(format!("expected a list, got {}", type_name(&other))),
        },
        PropertyKind::Map => match value {
            Value::Object(_) => Ok(value),
            other => Err(format!("expected a mapping, got {}", type_name(&other))),
        },
        PropertyKind::Enum(allowed) => match &value {
            Value::String(s) if allowed.contains(&s.as_str()) => Ok(value),
            Value::String(s) => Err(format!(
                "'{}' is not one of: {}",
                s,
                allowed.join(", ")
            )),
            other => Err(format!("expected one of {}, got {}", allowed.join(", "), type_name(other))),
        },
    }
}

/// Validator: value must be an absolute path
pub fn absolute_path(value: &Value) -> Result<(), String> {
    match value.as_str() {
        Some(p) if p.starts_with('/') => Ok(()),
        Some(p) => Err(format!("'{p}' is not an absolute path")),
        None => Err("path must be a string".to_string()),
    }
}

/// Validator: value must be a non-empty string without whitespace
pub fn plain_name(value: &Value) -> Result<(), String> {
    match value.as_str() {
        Some(s) if !s.is_empty() && !s.chars().any(char::is_whitespace) => Ok(()),
        Some(s) => Err(format!("'{s}' is not a valid name")),
        None => Err("name must be a string".to_string()),
    }
}
