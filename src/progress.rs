//! Progress tracking for a single run.
//!
//! Collects what the engine reports so `main` can log a one-line summary on
//! the diagnostic channel.

use reconcile::{Event, EventListener, EventStatus};

#[derive(Debug, Default)]
pub struct Progress {
    pub provider: Option<String>,
    pub actions: Vec<String>,
    pub changed: usize,
    pub failed: usize,
    pub pending: usize,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} changed", self.changed)];
        if self.pending > 0 {
            parts.push(format!("{} pending (noop)", self.pending));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        if !self.actions.is_empty() {
            parts.push(format!("action {}", self.actions.join(", ")));
        }
        if let Some(provider) = &self.provider {
            parts.push(format!("provider {provider}"));
        }
        parts.join(", ")
    }
}

impl EventListener for Progress {
    fn on_resolved(&mut self, _resource: &str, provider: &str) {
        // Imperative runs resolve twice; the provider is stable
        self.provider = Some(provider.to_string());
    }

    fn on_event(&mut self, _resource: &str, event: &Event) {
        match event.status {
            EventStatus::Success => self.changed += 1,
            EventStatus::Failure => self.failed += 1,
            EventStatus::Noop => self.pending += 1,
        }
    }

    fn on_action(&mut self, _resource: &str, action: &str) {
        self.actions.push(action.to_string());
    }
}
