//! Resource descriptors: the declared shape of a resource kind

use crate::property::{PropertyRole, PropertySpec};
use serde::Serialize;
use serde_json::Value;

/// Name of the action that does nothing
pub const NOTHING: &str = "nothing";

/// Name of the conventional presence property
pub const ENSURE: &str = "ensure";

/// What running an action does to the resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "effect", content = "value")]
pub enum ActionEffect {
    /// Leave the resource alone
    Nothing,
    /// Set `ensure` to the value and converge
    Ensure(&'static str),
    /// Set a boolean property and converge
    Flag(&'static str, bool),
    /// Provider-specific behavior
    Custom,
}

/// A named action and its effect
#[derive(Debug, Clone, Serialize)]
pub struct ActionSpec {
    pub name: &'static str,
    pub effect: ActionEffect,
}

impl ActionSpec {
    pub fn nothing() -> Self {
        Self {
            name: NOTHING,
            effect: ActionEffect::Nothing,
        }
    }

    pub fn ensure(name: &'static str, value: &'static str) -> Self {
        Self {
            name,
            effect: ActionEffect::Ensure(value),
        }
    }

    pub fn flag(name: &'static str, property: &'static str, value: bool) -> Self {
        Self {
            name,
            effect: ActionEffect::Flag(property, value),
        }
    }

    pub fn custom(name: &'static str) -> Self {
        Self {
            name,
            effect: ActionEffect::Custom,
        }
    }

    /// The property assignment this action implies, if any
    pub fn assignment(&self) -> Option<(&'static str, Value)> {
        match &self.effect {
            ActionEffect::Ensure(value) => Some((ENSURE, Value::from(*value))),
            ActionEffect::Flag(property, value) => Some((property, Value::Bool(*value))),
            ActionEffect::Nothing | ActionEffect::Custom => None,
        }
    }
}

/// The declared property set and actions of a resource kind
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    pub kind: &'static str,
    /// Property that names the resource
    pub identity: &'static str,
    pub properties: Vec<PropertySpec>,
    pub actions: Vec<ActionSpec>,
    pub default_action: &'static str,
}

impl ResourceDescriptor {
    /// Start a descriptor whose identity property is `identity`
    ///
    /// The identity property is declared first and the `nothing` action is
    /// always available.
    pub fn new(kind: &'static str, identity: PropertySpec) -> Self {
        Self {
            kind,
            identity: identity.name,
            properties: vec![identity],
            actions: vec![ActionSpec::nothing()],
            default_action: NOTHING,
        }
    }

    pub fn property(mut self, spec: PropertySpec) -> Self {
        self.properties.push(spec);
        self
    }

    pub fn action(mut self, spec: ActionSpec) -> Self {
        self.actions.push(spec);
        self
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn find_action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Declared property names in order
    pub fn property_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.properties.iter().map(|p| p.name)
    }

    /// Properties compared and synced during evaluation, in order
    pub fn state_properties(&self) -> impl Iterator<Item = &PropertySpec> {
        self.properties
            .iter()
            .filter(|p| p.role == PropertyRole::State)
    }

    pub fn action_names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|a| a.name).collect()
    }

    /// Reference used in messages, e.g. `file[/tmp/x]`
    pub fn reference(&self, name: &str) -> String {
        format!("{}[{}]", self.kind, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyKind;
    use serde_json::json;

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new("file", PropertySpec::identity("path"))
            .property(PropertySpec::state(
                "ensure",
                PropertyKind::Enum(&["present", "absent"]),
            ))
            .property(PropertySpec::state("content", PropertyKind::String))
            .property(PropertySpec::parameter("backup", PropertyKind::Boolean))
            .action(ActionSpec::ensure("create", "present"))
            .action(ActionSpec::custom("touch"))
    }

    #[test]
    fn test_identity_is_first() {
        let d = descriptor();
        assert_eq!(d.identity, "path");
        assert_eq!(
            d.property_names().collect::<Vec<_>>(),
            vec!["path", "ensure", "content", "backup"]
        );
    }

    #[test]
    fn test_nothing_always_declared() {
        let d = descriptor();
        assert_eq!(d.default_action, NOTHING);
        assert_eq!(d.action_names(), vec!["nothing", "create", "touch"]);
    }

    #[test]
    fn test_state_properties_exclude_identity_and_parameters() {
        let d = descriptor();
        let names: Vec<_> = d.state_properties().map(|p| p.name).collect();
        assert_eq!(names, vec!["ensure", "content"]);
    }

    #[test]
    fn test_action_assignment() {
        let d = descriptor();
        assert_eq!(
            d.find_action("create").unwrap().assignment(),
            Some(("ensure", json!("present")))
        );
        assert_eq!(d.find_action("touch").unwrap().assignment(), None);
        assert_eq!(
            ActionSpec::flag("enable", "enabled", true).assignment(),
            Some(("enabled", json!(true)))
        );
    }

    #[test]
    fn test_reference() {
        assert_eq!(descriptor().reference("/tmp/x"), "file[/tmp/x]");
    }
}
