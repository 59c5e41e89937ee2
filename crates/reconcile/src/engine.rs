//! Reconciliation engines
//!
//! [`Engine::converge`] handles declarative requests: evaluate, backfill,
//! read back, emit every declared property. [`Engine::run_action`] handles
//! imperative requests: configure, run one action, read back, emit what the
//! provider reports.

use crate::context::{ApplyContext, CommandRunner, EventListener};
use crate::descriptor::NOTHING;
use crate::error::{Error, Result, summarize};
use crate::facts::FactContext;
use crate::provider::Provider;
use crate::registry::{Registry, ResourceType};
use crate::request::{DeclarativeRequest, ImperativeRequest, Request};
use crate::resolver::Resolver;
use crate::resource::ResourceInstance;
use crate::serializer;
use crate::types::{EvaluationStatus, Event, EventStatus, PropertyMap};
use serde_json::Value;

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// What evaluation (or the action) did
    pub status: EvaluationStatus,
    /// The mapping to emit
    pub state: PropertyMap,
}

/// Runs requests against a registry
pub struct Engine<'a> {
    registry: &'a Registry,
    runner: &'a dyn CommandRunner,
}

impl<'a> Engine<'a> {
    pub fn new(registry: &'a Registry, runner: &'a dyn CommandRunner) -> Self {
        Self { registry, runner }
    }

    /// Dispatch a parsed request to the matching strategy
    pub fn execute(&self, request: &Request, listener: &mut dyn EventListener) -> Result<Outcome> {
        match request {
            Request::Declarative(r) => self.converge(r, listener),
            Request::Imperative(r) => self.run_action(r, listener),
        }
    }

    /// Declarative strategy
    ///
    /// Nothing is emitted unless evaluation and the read-back both succeed.
    pub fn converge(
        &self,
        request: &DeclarativeRequest,
        listener: &mut dyn EventListener,
    ) -> Result<Outcome> {
        let facts = effective_facts(&request.facts);
        let resolver = Resolver::new(self.registry);

        let resource_type = resolver.resolve(&request.kind, &facts)?;
        let mut resource =
            ResourceInstance::from_attributes(&resource_type.descriptor, &request.attributes)?;
        let provider = resolver.resolve_provider(resource_type, &resource, &facts)?;

        let reference = resource.reference();
        let mut ctx = ApplyContext::new(&facts, self.runner, listener).with_noop(request.noop);
        ctx.resolved(&reference, provider.name());

        let status = provider.evaluate(&resource, &mut ctx).map_err(|e| {
            Error::EvaluationFailure {
                resource: reference.clone(),
                events: vec![
                    Event::new("evaluate", None, Value::Null, EventStatus::Failure)
                        .with_message(format!("{e:#}")),
                ],
            }
        })?;

        match &status {
            EvaluationStatus::Failed(events) => {
                return Err(Error::EvaluationFailure {
                    resource: reference,
                    events: events.clone(),
                });
            }
            EvaluationStatus::Applied(events) => {
                log::info!("{reference}: {} change(s) applied", events.len());
            }
            EvaluationStatus::Unchanged => log::info!("{reference}: unchanged"),
        }

        resource.backfill();
        resource.seal();

        let current = provider
            .load_current_state(&resource, &mut ctx)
            .map_err(|e| Error::StateRetrieval {
                resource: reference,
                message: format!("{e:#}"),
            })?;

        Ok(Outcome {
            status,
            state: serializer::declarative(&resource, &current),
        })
    }

    /// Imperative strategy
    ///
    /// The action is validated before any side effect. After the action the
    /// provider is resolved again and the current state is loaded, even when
    /// the action failed, so the failure can carry it.
    pub fn run_action(
        &self,
        request: &ImperativeRequest,
        listener: &mut dyn EventListener,
    ) -> Result<Outcome> {
        let facts = effective_facts(&request.facts);
        let resolver = Resolver::new(self.registry);
        let action = request.action.as_deref().unwrap_or(NOTHING);

        let resource_type = resolver.resolve(&request.resource_class, &facts)?;
        let mut resource = ResourceInstance::new(&resource_type.descriptor, &request.resource_name)?;
        for (key, value) in &request.properties {
            resource.set(key, value.clone())?;
        }

        if resource_type.descriptor.find_action(action).is_none() {
            return Err(Error::ActionExecution {
                action: action.to_string(),
                message: format!(
                    "{} does not support action '{action}' (available: {})",
                    resource_type.kind(),
                    resource_type.descriptor.action_names().join(", ")
                ),
                current_state: None,
            });
        }

        let provider = resolver.resolve_provider(resource_type, &resource, &facts)?;
        let reference = resource.reference();
        let mut ctx = ApplyContext::new(&facts, self.runner, listener).with_noop(request.noop);
        ctx.resolved(&reference, provider.name());

        let (status, failure) = if request.noop {
            log::info!("{reference}: noop, skipping action {action}");
            (EvaluationStatus::Unchanged, None)
        } else {
            ctx.action(&reference, action);
            match provider.run_action(&mut resource, action, &mut ctx) {
                Ok(EvaluationStatus::Failed(events)) => {
                    let message = summarize(&events);
                    (EvaluationStatus::Failed(events), Some(message))
                }
                Ok(status) => (status, None),
                Err(e) => (EvaluationStatus::Failed(Vec::new()), Some(format!("{e:#}"))),
            }
        };

        resource.seal();
        let current = read_back(&resolver, resource_type, &resource, &facts, &mut ctx);

        match (failure, current) {
            (Some(message), current) => {
                let current_state = current
                    .inspect_err(|e| log::warn!("{reference}: {e}"))
                    .ok();
                Err(Error::ActionExecution {
                    action: action.to_string(),
                    message,
                    current_state,
                })
            }
            (None, Ok(state)) => Ok(Outcome {
                status,
                state: serializer::imperative(state),
            }),
            (None, Err(e)) => Err(e),
        }
    }
}

/// Facts to resolve with: the request's own, or the generic Linux profile
/// when none were supplied
/// Fill missing `os` and `platform` from the generic Linux profile
fn effective_facts(facts: &FactContext) -> FactContext {
    let effective = facts.merged_over(&FactContext::generic_linux());
    if effective != *facts {
        log::debug!("Defaulted facts to {effective}");
    }
    effective
}

fn read_back<'r>(
    resolver: &Resolver<'r>,
    resource_type: &'r ResourceType,
    resource: &ResourceInstance,
    facts: &FactContext,
    ctx: &mut ApplyContext,
) -> Result<PropertyMap> {
    let provider: &dyn Provider = resolver.resolve_provider(resource_type, resource, facts)?;
    log::debug!("{}: reading state with {}", resource.reference(), provider.name());

    provider
        .load_current_state(resource, ctx)
        .map_err(|e| Error::StateRetrieval {
            resource: resource.reference(),
            message: format!("{e:#}"),
        })
}
