//! Apply context and collaborator traits
//!
//! These traits let the core run without depending on a specific process
//! runner or output surface. Providers never spawn processes themselves;
//! they go through the context's [`CommandRunner`].

use crate::facts::FactContext;
use crate::types::{CommandOutput, Event};
use anyhow::Result;

/// Runs external commands on behalf of providers
pub trait CommandRunner {
    /// Run a command and collect its output
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a command and return just success/failure
    fn run_status(&self, cmd: &str, args: &[&str]) -> Result<bool> {
        Ok(self.run(cmd, args)?.success)
    }

    /// Run a command and capture trimmed stdout, failing on non-zero exit
    fn run_capture(&self, cmd: &str, args: &[&str]) -> Result<String> {
        let output = self.run(cmd, args)?;
        if !output.success {
            anyhow::bail!(
                "{} {} failed: {}",
                cmd,
                args.join(" "),
                output.stderr_str().trim()
            );
        }
        Ok(output.stdout_str().trim().to_string())
    }

    /// Run a command, failing on non-zero exit
    fn run_checked(&self, cmd: &str, args: &[&str]) -> Result<()> {
        self.run_capture(cmd, args).map(|_| ())
    }
}

/// Receives notifications while a resource is reconciled
pub trait EventListener {
    /// A provider was selected for the resource
    fn on_resolved(&mut self, resource: &str, provider: &str);

    /// A property change was recorded
    fn on_event(&mut self, resource: &str, event: &Event);

    /// An action is about to run
    fn on_action(&mut self, resource: &str, action: &str);
}

/// No-op listener
pub struct NoListener;

impl EventListener for NoListener {
    fn on_resolved(&mut self, _resource: &str, _provider: &str) {}
    fn on_event(&mut self, _resource: &str, _event: &Event) {}
    fn on_action(&mut self, _resource: &str, _action: &str) {}
}

/// Runner for contexts that must not spawn processes
pub struct NoCommands;

impl CommandRunner for NoCommands {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        anyhow::bail!("running commands is not available: {} {}", cmd, args.join(" "))
    }
}

/// Context passed to provider operations
///
/// Carries the facts the resource was resolved with; there is no desired
/// state comparison machinery here, that lives in the provider harness.
pub struct ApplyContext<'a> {
    pub facts: &'a FactContext,
    /// Report needed changes without making them
    pub noop: bool,
    pub runner: &'a dyn CommandRunner,
    listener: &'a mut dyn EventListener,
}

impl<'a> ApplyContext<'a> {
    pub fn new(
        facts: &'a FactContext,
        runner: &'a dyn CommandRunner,
        listener: &'a mut dyn EventListener,
    ) -> Self {
        Self {
            facts,
            noop: false,
            runner,
            listener,
        }
    }

    pub fn with_noop(mut self, noop: bool) -> Self {
        self.noop = noop;
        self
    }

    /// Record an event with the listener and pass it back
    pub fn record(&mut self, resource: &str, event: Event) -> Event {
        log::info!("{resource}: {event}");
        self.listener.on_event(resource, &event);
        event
    }

    pub fn resolved(&mut self, resource: &str, provider: &str) {
        log::debug!("{resource}: using provider {provider}");
        self.listener.on_resolved(resource, provider);
    }

    pub fn action(&mut self, resource: &str, action: &str) {
        log::info!("{resource}: running action {action}");
        self.listener.on_action(resource, action);
    }
}
