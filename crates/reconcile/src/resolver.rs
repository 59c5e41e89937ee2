//! Resolution of kinds and providers from facts
//!
//! Resolution is a pure function of the kind, the facts and the resource's
//! explicit provider choice: the same inputs always select the same
//! implementation, so re-resolving after an action is stable.

use crate::error::{Error, Result};
use crate::facts::FactContext;
use crate::provider::Provider;
use crate::registry::{Registry, ResourceType};
use crate::resource::ResourceInstance;

/// Selects resource types and providers for a fact context
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'r> {
    registry: &'r Registry,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Resolve a kind to its registered type
    ///
    /// Fails with `UnknownType` when nothing is registered under the kind and
    /// with `UnsupportedPlatform` when no provider of the type applies.
    pub fn resolve(&self, kind: &str, facts: &FactContext) -> Result<&'r ResourceType> {
        let resource_type = self
            .registry
            .lookup(kind)
            .ok_or_else(|| Error::UnknownType(kind.to_string()))?;

        if !resource_type.providers.iter().any(|p| p.supports(facts)) {
            return Err(unsupported(resource_type, facts));
        }

        log::debug!("Resolved '{}' to type {}", kind, resource_type.kind());
        Ok(resource_type)
    }

    /// Resolve the provider for a resource in its current state
    ///
    /// An explicit provider choice on the resource wins over the facts.
    /// Otherwise the first provider in priority order that supports the
    /// facts is selected.
    pub fn resolve_provider(
        &self,
        resource_type: &'r ResourceType,
        resource: &ResourceInstance,
        facts: &FactContext,
    ) -> Result<&'r dyn Provider> {
        if let Some(hint) = resource.provider_hint() {
            return resource_type.find_provider(hint).ok_or_else(|| {
                Error::unsupported(
                    resource_type.kind(),
                    format!(
                        "no provider named '{}' (available: {})",
                        hint,
                        resource_type.provider_names().join(", ")
                    ),
                )
            });
        }

        resource_type
            .providers
            .iter()
            .find(|p| p.supports(facts))
            .map(|p| p.as_ref())
            .ok_or_else(|| unsupported(resource_type, facts))
    }
}

fn unsupported(resource_type: &ResourceType, facts: &FactContext) -> Error {
    Error::unsupported(
        resource_type.kind(),
        format!(
            "no provider supports {facts} (available: {})",
            resource_type.provider_names().join(", ")
        ),
    )
}
