//! Materialized resource instances
//!
//! A [`ResourceInstance`] is one named resource of a kind: its identity, the
//! property values assigned so far and, optionally, an explicit provider
//! choice. Values go through the descriptor's setter table on assignment.
//! Once evaluation completes the instance is sealed and no longer mutable.

use crate::descriptor::ResourceDescriptor;
use crate::error::{Error, Result};
use crate::types::PropertyMap;
use serde_json::Value;

/// Reserved property that selects a provider by name
pub const PROVIDER: &str = "provider";

/// Keys accepted as the identity when the identity property is absent
const NAME_KEYS: [&str; 2] = ["name", "title"];

/// A resource being reconciled
#[derive(Debug, Clone)]
pub struct ResourceInstance<'d> {
    name: String,
    descriptor: &'d ResourceDescriptor,
    properties: PropertyMap,
    provider_hint: Option<String>,
    sealed: bool,
}

impl<'d> ResourceInstance<'d> {
    /// Create an instance named `name`; the identity property is set to it
    pub fn new(descriptor: &'d ResourceDescriptor, name: &str) -> Result<Self> {
        let mut resource = Self {
            name: name.to_string(),
            descriptor,
            properties: PropertyMap::new(),
            provider_hint: None,
            sealed: false,
        };
        resource.set(descriptor.identity, Value::String(name.to_string()))?;
        Ok(resource)
    }

    /// Build an instance from a declarative attribute mapping
    ///
    /// The identity comes from the identity attribute, else `name`, else
    /// `title`.
    pub fn from_attributes(descriptor: &'d ResourceDescriptor, attributes: &PropertyMap) -> Result<Self> {
        let identity = std::iter::once(descriptor.identity)
            .chain(NAME_KEYS)
            .find_map(|key| attributes.get(key).map(|v| (key, v)));

        let name = match identity {
            Some((_, Value::String(name))) => name.clone(),
            Some((key, other)) => {
                return Err(Error::assignment(
                    key,
                    format!("identity must be a string, got {other}"),
                ));
            }
            None => {
                return Err(Error::MalformedInput(format!(
                    "attributes for {} need '{}' (or 'name'/'title')",
                    descriptor.kind, descriptor.identity
                )));
            }
        };

        let mut resource = Self::new(descriptor, &name)?;
        for (key, value) in attributes {
            if key == descriptor.identity {
                continue;
            }
            if NAME_KEYS.contains(&key.as_str()) && descriptor.find_property(key).is_none() {
                continue;
            }
            resource.set(key, value.clone())?;
        }
        Ok(resource)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &'static str {
        self.descriptor.kind
    }

    pub fn descriptor(&self) -> &'d ResourceDescriptor {
        self.descriptor
    }

    /// Reference used in messages, e.g. `file[/tmp/x]`
    pub fn reference(&self) -> String {
        self.descriptor.reference(&self.name)
    }

    /// Assign a property through the setter table
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        if self.sealed {
            return Err(Error::assignment(
                key,
                format!("{} is sealed after evaluation", self.reference()),
            ));
        }

        if key == PROVIDER {
            return match value {
                Value::String(provider) => {
                    self.provider_hint = Some(provider);
                    Ok(())
                }
                other => Err(Error::assignment(
                    key,
                    format!("provider must be a string, got {other}"),
                )),
            };
        }

        let spec = self.descriptor.find_property(key).ok_or_else(|| {
            Error::assignment(
                key,
                format!("{} has no property named '{key}'", self.descriptor.kind),
            )
        })?;

        let value = spec
            .coerce(value)
            .map_err(|message| Error::assignment(key, message))?;

        if spec.name == self.descriptor.identity {
            if let Value::String(name) = &value {
                self.name.clone_from(name);
            }
        }

        self.properties.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn provider_hint(&self) -> Option<&str> {
        self.provider_hint.as_deref()
    }

    /// Explicitly assigned values (identity first, then assignment order)
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Insert a placeholder for every declared property not yet set,
    /// keeping declared order
    pub fn backfill(&mut self) {
        let mut filled = PropertyMap::new();
        for spec in &self.descriptor.properties {
            let value = self
                .properties
                .remove(spec.name)
                .unwrap_or_else(|| spec.placeholder.clone());
            filled.insert(spec.name.to_string(), value);
        }
        self.properties = filled;
    }

    /// Freeze the property mapping
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyKind, PropertySpec, absolute_path};
    use serde_json::json;

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new(
            "file",
            PropertySpec::identity("path").with_validator(absolute_path),
        )
        .property(PropertySpec::state(
            "ensure",
            PropertyKind::Enum(&["present", "absent"]),
        ))
        .property(PropertySpec::state("content", PropertyKind::String))
        .property(PropertySpec::state("mode", PropertyKind::FileMode))
        .property(PropertySpec::parameter("backup", PropertyKind::Boolean))
    }

    fn attributes(value: serde_json::Value) -> PropertyMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_new_sets_identity() {
        let d = descriptor();
        let r = ResourceInstance::new(&d, "/tmp/x").unwrap();
        assert_eq!(r.name(), "/tmp/x");
        assert_eq!(r.get_str("path"), Some("/tmp/x"));
        assert_eq!(r.reference(), "file[/tmp/x]");
    }

    #[test]
    fn test_new_validates_identity() {
        let d = descriptor();
        let err = ResourceInstance::new(&d, "relative").unwrap_err();
        assert!(matches!(err, Error::PropertyAssignment { ref property, .. } if property == "path"));
    }

    #[test]
    fn test_set_coerces() {
        let d = descriptor();
        let mut r = ResourceInstance::new(&d, "/tmp/x").unwrap();
        r.set("mode", json!(420)).unwrap();
        assert_eq!(r.get_str("mode"), Some("0644"));
    }

    #[test]
    fn test_unknown_property_fails_fast() {
        let d = descriptor();
        let mut r = ResourceInstance::new(&d, "/tmp/x").unwrap();
        let err = r.set("contnet", json!("typo")).unwrap_err();
        match err {
            Error::PropertyAssignment { property, message } => {
                assert_eq!(property, "contnet");
                assert!(message.contains("no property"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_provider_hint() {
        let d = descriptor();
        let mut r = ResourceInstance::new(&d, "/tmp/x").unwrap();
        r.set(PROVIDER, json!("posix")).unwrap();
        assert_eq!(r.provider_hint(), Some("posix"));
        assert!(!r.is_set(PROVIDER));
        assert!(r.set(PROVIDER, json!(1)).is_err());
    }

    #[test]
    fn test_from_attributes_identity_sources() {
        let d = descriptor();
        let by_path =
            ResourceInstance::from_attributes(&d, &attributes(json!({"path": "/a"}))).unwrap();
        assert_eq!(by_path.name(), "/a");

        let by_title =
            ResourceInstance::from_attributes(&d, &attributes(json!({"title": "/b", "content": "x"})))
                .unwrap();
        assert_eq!(by_title.name(), "/b");
        assert_eq!(by_title.get_str("content"), Some("x"));
        assert!(!by_title.is_set("title"));
    }

    #[test]
    fn test_from_attributes_missing_identity() {
        let d = descriptor();
        let err = ResourceInstance::from_attributes(&d, &attributes(json!({"content": "x"})))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }

    #[test]
    fn test_backfill_declared_order_and_placeholders() {
        let d = descriptor();
        let mut r = ResourceInstance::from_attributes(
            &d,
            &attributes(json!({"content": "hi", "path": "/tmp/x"})),
        )
        .unwrap();
        r.backfill();

        let keys: Vec<_> = r.properties().keys().cloned().collect();
        assert_eq!(keys, vec!["path", "ensure", "content", "mode", "backup"]);
        assert_eq!(r.get("mode"), Some(&Value::Null));
        assert_eq!(r.get_str("content"), Some("hi"));
    }

    #[test]
    fn test_sealed_rejects_assignment() {
        let d = descriptor();
        let mut r = ResourceInstance::new(&d, "/tmp/x").unwrap();
        r.seal();
        assert!(r.is_sealed());
        assert!(r.set("content", json!("late")).is_err());
    }
}
