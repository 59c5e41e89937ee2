//! Resource type registry
//!
//! Maps kind identifiers to their descriptor and provider list. The registry
//! is populated before reconciliation starts and is only read afterwards.

use crate::descriptor::ResourceDescriptor;
use crate::provider::Provider;
use std::collections::BTreeMap;

/// A registered resource kind: its declared shape and candidate providers
///
/// Providers are kept in priority order; the first one that supports the
/// facts wins.
#[derive(Debug)]
pub struct ResourceType {
    pub descriptor: ResourceDescriptor,
    pub providers: Vec<Box<dyn Provider>>,
}

impl ResourceType {
    pub fn new(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            providers: Vec::new(),
        }
    }

    pub fn provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn kind(&self) -> &'static str {
        self.descriptor.kind
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn find_provider(&self, name: &str) -> Option<&dyn Provider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }
}

/// Lookup table from kind identifier to implementation
#[derive(Debug, Default)]
pub struct Registry {
    types: BTreeMap<&'static str, ResourceType>,
    aliases: BTreeMap<&'static str, &'static str>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing any previous type of the same kind
    pub fn register(&mut self, resource_type: ResourceType) -> &mut Self {
        let kind = resource_type.kind();
        if self.types.insert(kind, resource_type).is_some() {
            log::warn!("Resource type '{kind}' registered twice, keeping the last one");
        }
        self
    }

    /// Make `alias` resolve to `kind`
    pub fn alias(&mut self, alias: &'static str, kind: &'static str) -> &mut Self {
        self.aliases.insert(alias, kind);
        self
    }

    pub fn lookup(&self, kind: &str) -> Option<&ResourceType> {
        self.types.get(kind).or_else(|| {
            self.aliases
                .get(kind)
                .and_then(|target| self.types.get(target))
        })
    }

    /// Registered types in kind order
    pub fn types(&self) -> impl Iterator<Item = &ResourceType> {
        self.types.values()
    }

    pub fn aliases_of(&self, kind: &str) -> Vec<&'static str> {
        self.aliases
            .iter()
            .filter(|(_, target)| **target == kind)
            .map(|(alias, _)| *alias)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
