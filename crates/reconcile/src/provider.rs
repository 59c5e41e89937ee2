//! Provider trait: the capability interface of a resource implementation
//!
//! A provider knows how to inspect and change one resource kind on a family
//! of platforms. The engines only ever talk to resources through this trait.

use crate::context::ApplyContext;
use crate::descriptor::{ActionEffect, ENSURE};
use crate::facts::FactContext;
use crate::resource::ResourceInstance;
use crate::types::{EvaluationStatus, Event, EventStatus, PropertyMap};
use anyhow::{Result, bail};
use serde_json::Value;
use std::fmt;

/// Value of `ensure` that removes the resource
pub const ABSENT: &str = "absent";

/// Platform-specific implementation strategy for a resource kind
///
/// # Example
///
/// ```ignore
/// #[derive(Debug)]
/// struct Posix;
///
/// impl Provider for Posix {
///     fn name(&self) -> &'static str { "posix" }
///
///     fn supports(&self, facts: &FactContext) -> bool {
///         !facts.is_os(&["windows"])
///     }
///
///     fn load_current_state(&self, resource: &ResourceInstance, _ctx: &mut ApplyContext) -> Result<PropertyMap> {
///         // query the system
///     }
///
///     fn sync(&self, resource: &ResourceInstance, property: &str, desired: &Value, ctx: &mut ApplyContext) -> Result<()> {
///         // change one property
///     }
/// }
/// ```
pub trait Provider: Send + Sync + fmt::Debug {
    /// Provider name, used for explicit selection and in messages
    fn name(&self) -> &'static str;

    /// Whether this provider applies to the given facts
    fn supports(&self, facts: &FactContext) -> bool;

    /// Read the real state of the resource from the system
    ///
    /// Properties that cannot be observed may be omitted. The returned order
    /// is the provider's natural reporting order.
    fn load_current_state(
        &self,
        resource: &ResourceInstance,
        ctx: &mut ApplyContext,
    ) -> Result<PropertyMap>;

    /// Change a single property to its desired value
    fn sync(
        &self,
        resource: &ResourceInstance,
        property: &str,
        desired: &Value,
        ctx: &mut ApplyContext,
    ) -> Result<()>;

    /// Compare current state to desired properties and converge
    fn evaluate(
        &self,
        resource: &ResourceInstance,
        ctx: &mut ApplyContext,
    ) -> Result<EvaluationStatus> {
        Ok(converge_properties(self, resource, ctx))
    }

    /// Run a named action against the resource
    ///
    /// The default applies the action's declared effect and evaluates.
    /// Providers override this for actions declared as custom and delegate
    /// the rest to [`apply_action`].
    fn run_action(
        &self,
        resource: &mut ResourceInstance,
        action: &str,
        ctx: &mut ApplyContext,
    ) -> Result<EvaluationStatus> {
        apply_action(self, resource, action, ctx)
    }
}

/// Apply an action's declared effect to the resource and evaluate it
pub fn apply_action<P: Provider + ?Sized>(
    provider: &P,
    resource: &mut ResourceInstance,
    action: &str,
    ctx: &mut ApplyContext,
) -> Result<EvaluationStatus> {
    let Some(spec) = resource.descriptor().find_action(action) else {
        bail!("{} does not support action '{action}'", resource.kind());
    };

    match &spec.effect {
        ActionEffect::Nothing => Ok(EvaluationStatus::Unchanged),
        ActionEffect::Custom => bail!(
            "provider {} does not implement action '{action}'",
            provider.name()
        ),
        _ => {
            if let Some((property, value)) = spec.assignment() {
                resource.set(property, value)?;
            }
            provider.evaluate(resource, ctx)
        }
    }
}

/// The evaluation harness shared by providers
///
/// Loads current state, syncs `ensure` first, then every other out-of-sync
/// state property in declared order. A failed `ensure` or a desired `absent`
/// skips the rest; other failures are recorded and evaluation continues.
pub fn converge_properties<P: Provider + ?Sized>(
    provider: &P,
    resource: &ResourceInstance,
    ctx: &mut ApplyContext,
) -> EvaluationStatus {
    let reference = resource.reference();
    let mut events = Vec::new();

    let mut current = match provider.load_current_state(resource, ctx) {
        Ok(current) => current,
        Err(e) => {
            events.push(ctx.record(
                &reference,
                Event::new("retrieve", None, Value::Null, EventStatus::Failure)
                    .with_message(format!("{e:#}")),
            ));
            return EvaluationStatus::Failed(events);
        }
    };

    if let Some(desired) = resource.get(ENSURE) {
        let absent = desired.as_str() == Some(ABSENT);
        let insync = resource
            .descriptor()
            .find_property(ENSURE)
            .is_some_and(|spec| spec.insync(current.get(ENSURE), desired));

        if !insync {
            let event = sync_one(provider, resource, ENSURE, desired, &current, ctx);
            let failed = event.is_failure();
            let noop = event.status == EventStatus::Noop;
            events.push(ctx.record(&reference, event));

            if failed || absent {
                return EvaluationStatus::from_events(events);
            }

            if noop {
                // Nothing was created, so every other desired value is pending
                current = PropertyMap::new();
            } else {
                match provider.load_current_state(resource, ctx) {
                    Ok(reloaded) => current = reloaded,
                    Err(e) => {
                        events.push(ctx.record(
                            &reference,
                            Event::new("retrieve", None, Value::Null, EventStatus::Failure)
                                .with_message(format!("{e:#}")),
                        ));
                        return EvaluationStatus::Failed(events);
                    }
                }
            }
        } else if absent {
            // Already gone; the other properties describe nothing
            return EvaluationStatus::from_events(events);
        }
    }

    for spec in resource.descriptor().state_properties() {
        if spec.name == ENSURE {
            continue;
        }
        let Some(desired) = resource.get(spec.name) else {
            continue;
        };
        if spec.insync(current.get(spec.name), desired) {
            continue;
        }

        let event = sync_one(provider, resource, spec.name, desired, &current, ctx);
        events.push(ctx.record(&reference, event));
    }

    EvaluationStatus::from_events(events)
}

fn sync_one<P: Provider + ?Sized>(
    provider: &P,
    resource: &ResourceInstance,
    property: &str,
    desired: &Value,
    current: &PropertyMap,
    ctx: &mut ApplyContext,
) -> Event {
    let previous = current.get(property).cloned();

    if ctx.noop {
        return Event::new(property, previous, desired.clone(), EventStatus::Noop);
    }

    match provider.sync(resource, property, desired, ctx) {
        Ok(()) => Event::new(property, previous, desired.clone(), EventStatus::Success),
        Err(e) => Event::new(property, previous, desired.clone(), EventStatus::Failure)
            .with_message(format!("{e:#}")),
    }
}
