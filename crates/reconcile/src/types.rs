//! Core types for resource reconciliation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::process::Output;

/// Property name to value mapping, kept in insertion order
pub type PropertyMap = serde_json::Map<String, Value>;

/// Outcome of a single property change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// The change was applied
    Success,
    /// The change was attempted and failed
    Failure,
    /// The change was needed but not applied (noop mode)
    Noop,
}

/// A structured change or failure record produced during evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Property that was out of sync
    pub property: String,
    /// Value observed before the change
    pub previous: Value,
    /// Value the change aimed for
    pub desired: Value,
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Event {
    pub fn new(
        property: impl Into<String>,
        previous: Option<Value>,
        desired: Value,
        status: EventStatus,
    ) -> Self {
        Self {
            property: property.into(),
            previous: previous.unwrap_or(Value::Null),
            desired,
            status,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status == EventStatus::Failure
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            EventStatus::Success => write!(
                f,
                "{} changed {} to {}",
                self.property, self.previous, self.desired
            ),
            EventStatus::Noop => write!(
                f,
                "{} is {}, should be {} (noop)",
                self.property, self.previous, self.desired
            ),
            EventStatus::Failure => write!(
                f,
                "{} could not change {} to {}: {}",
                self.property,
                self.previous,
                self.desired,
                self.message.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Outcome of evaluating a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "events", rename_all = "lowercase")]
pub enum EvaluationStatus {
    /// Current state already matched the desired state
    Unchanged,
    /// Changes were applied successfully
    Applied(Vec<Event>),
    /// At least one change failed
    Failed(Vec<Event>),
}

impl EvaluationStatus {
    /// Fold recorded events into a status
    pub fn from_events(events: Vec<Event>) -> Self {
        if events.iter().any(Event::is_failure) {
            Self::Failed(events)
        } else if events.iter().any(|e| e.status == EventStatus::Success) {
            Self::Applied(events)
        } else {
            Self::Unchanged
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_change(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn events(&self) -> &[Event] {
        match self {
            Self::Unchanged => &[],
            Self::Applied(events) | Self::Failed(events) => events,
        }
    }
}

/// Output from a command run through a [`crate::CommandRunner`]
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into().into_bytes(),
            stderr: Vec::new(),
            success: true,
        }
    }

    /// Failed output with the given stderr
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into().into_bytes(),
            success: false,
        }
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(status: EventStatus) -> Event {
        Event::new("content", Some(json!("old")), json!("new"), status)
    }

    #[test]
    fn test_status_from_no_events() {
        assert_eq!(
            EvaluationStatus::from_events(Vec::new()),
            EvaluationStatus::Unchanged
        );
    }

    #[test]
    fn test_status_from_noop_events_is_unchanged() {
        let status = EvaluationStatus::from_events(vec![event(EventStatus::Noop)]);
        assert_eq!(status, EvaluationStatus::Unchanged);
    }

    #[test]
    fn test_status_failure_wins() {
        let status = EvaluationStatus::from_events(vec![
            event(EventStatus::Success),
            event(EventStatus::Failure),
        ]);
        assert!(status.is_failed());
        assert_eq!(status.events().len(), 2);
    }

    #[test]
    fn test_status_applied() {
        let status = EvaluationStatus::from_events(vec![event(EventStatus::Success)]);
        assert!(status.is_change());
    }

    #[test]
    fn test_event_serializes_lowercase_status() {
        let value = serde_json::to_value(event(EventStatus::Noop)).unwrap();
        assert_eq!(value["status"], "noop");
        assert_eq!(value["previous"], "old");
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_event_display_includes_message() {
        let e = event(EventStatus::Failure).with_message("disk full");
        assert!(e.to_string().contains("disk full"));
    }

    #[test]
    fn test_command_output_helpers() {
        assert!(CommandOutput::ok("x").success);
        assert_eq!(CommandOutput::ok("x").stdout_str(), "x");
        assert_eq!(CommandOutput::failed("boom").stderr_str(), "boom");
    }
}
