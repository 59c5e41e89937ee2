//! Error types for reconciliation.
//!
//! Every error is terminal for the invocation. Errors are grouped into
//! categories so the caller can map them to exit codes and decide whether
//! to re-invoke with different facts or properties.

use crate::types::{Event, PropertyMap};
use serde_json::{Value, json};
use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request could not be parsed.
    Input,
    /// No type or provider matches the request.
    Resolution,
    /// A property could not be assigned.
    Configuration,
    /// Convergence or read-back failed, possibly after side effects.
    Evaluation,
    /// The requested action failed, possibly after side effects.
    Action,
}

impl ErrorCategory {
    /// Process exit code for this category.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Input => 64,
            Self::Resolution => 65,
            Self::Configuration => 66,
            Self::Evaluation | Self::Action => 1,
        }
    }

    /// Whether the real system may have been modified before the failure.
    #[must_use]
    pub fn may_have_side_effects(&self) -> bool {
        matches!(self, Self::Evaluation | Self::Action)
    }

    /// Get a user-friendly description of this category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Input => "Malformed request",
            Self::Resolution => "Resolution failed",
            Self::Configuration => "Invalid property",
            Self::Evaluation => "Evaluation failed",
            Self::Action => "Action failed",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling a resource.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing required field or unparsable payload.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// No registered implementation for the kind.
    #[error("unknown resource type: {0}")]
    UnknownType(String),

    /// No provider declares support for the facts.
    #[error("unsupported platform for {kind}: {reason}")]
    UnsupportedPlatform {
        /// Resource kind being resolved.
        kind: String,
        /// What did not match.
        reason: String,
    },

    /// A property setter rejected its name or value.
    #[error("cannot assign property '{property}': {message}")]
    PropertyAssignment {
        /// Offending property name.
        property: String,
        /// Why the setter rejected it.
        message: String,
    },

    /// Declarative evaluation reported failure.
    #[error("evaluation of {resource} failed: {}", summarize(.events))]
    EvaluationFailure {
        /// Resource reference, e.g. `file[/tmp/x]`.
        resource: String,
        /// Change and failure events, in the order they were recorded.
        events: Vec<Event>,
    },

    /// Imperative action failed.
    #[error("action '{action}' failed: {message}")]
    ActionExecution {
        /// Action that was requested.
        action: String,
        /// Failure detail.
        message: String,
        /// State read back after the failure, when it could be loaded.
        current_state: Option<PropertyMap>,
    },

    /// Reading back the current state failed.
    #[error("cannot load current state of {resource}: {message}")]
    StateRetrieval {
        /// Resource reference.
        resource: String,
        /// Failure detail.
        message: String,
    },
}

pub(crate) fn summarize(events: &[Event]) -> String {
    let failures: Vec<String> = events
        .iter()
        .filter(|e| e.is_failure())
        .map(ToString::to_string)
        .collect();

    if failures.is_empty() {
        "no failure event recorded".to_string()
    } else {
        failures.join("; ")
    }
}

impl Error {
    /// Create a property assignment error.
    pub fn assignment(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PropertyAssignment {
            property: property.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported platform error.
    pub fn unsupported(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MalformedInput(_) => ErrorCategory::Input,
            Error::UnknownType(_) | Error::UnsupportedPlatform { .. } => ErrorCategory::Resolution,
            Error::PropertyAssignment { .. } => ErrorCategory::Configuration,
            Error::EvaluationFailure { .. } | Error::StateRetrieval { .. } => {
                ErrorCategory::Evaluation
            }
            Error::ActionExecution { .. } => ErrorCategory::Action,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    /// Structured detail for the diagnostic channel.
    #[must_use]
    pub fn details(&self) -> Value {
        let mut detail = json!({
            "error": self.to_string(),
            "category": format!("{:?}", self.category()).to_lowercase(),
        });

        match self {
            Error::EvaluationFailure { events, .. } => {
                detail["events"] = json!(events);
            }
            Error::ActionExecution {
                current_state: Some(state),
                ..
            } => {
                detail["current_state"] = Value::Object(state.clone());
            }
            Error::PropertyAssignment { property, .. } => {
                detail["property"] = json!(property);
            }
            _ => {}
        }

        detail
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedInput(err.to_string())
    }
}
