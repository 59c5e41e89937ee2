//! State serializer
//!
//! Renders the final property mapping. Values keep their JSON types; nothing
//! is stringified.

use crate::property::PropertyRole;
use crate::resource::ResourceInstance;
use crate::types::PropertyMap;
use serde_json::Value;

/// Render a declarative result in declared property order
///
/// Identity and state properties take the read-back value, falling back to
/// the instance's value (its placeholder after backfill) when the provider
/// does not report one. Parameters are never read back and keep the
/// instance's value.
pub fn declarative(resource: &ResourceInstance, current: &PropertyMap) -> PropertyMap {
    let mut output = PropertyMap::new();

    for spec in &resource.descriptor().properties {
        let assigned = resource
            .get(spec.name)
            .cloned()
            .unwrap_or_else(|| spec.placeholder.clone());

        let value = match spec.role {
            PropertyRole::Parameter => assigned,
            PropertyRole::Identity | PropertyRole::State => match current.get(spec.name) {
                Some(observed) => observed.clone(),
                None => spec.placeholder.clone(),
            },
        };

        output.insert(spec.name.to_string(), value);
    }

    output
}

/// Render an imperative result exactly as the provider reported it; unlike
/// [`declarative`], nothing declared is backfilled into the map.
pub fn imperative(current: PropertyMap) -> PropertyMap {
    current
}

/// Serialize a property mapping as a JSON object
pub fn to_json(map: &PropertyMap, pretty: bool) -> String {
    let value = Value::Object(map.clone());
    if pretty {
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ResourceDescriptor;
    use crate::property::{PropertyKind, PropertySpec};
    use serde_json::json;

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new("file", PropertySpec::identity("path"))
            .property(PropertySpec::state(
                "ensure",
                PropertyKind::Enum(&["present", "absent"]),
            ))
            .property(PropertySpec::state("content", PropertyKind::String))
            .property(PropertySpec::state("mode", PropertyKind::FileMode))
            .property(PropertySpec::state("groups", PropertyKind::StringList).with_placeholder(json!([])))
            .property(PropertySpec::parameter("backup", PropertyKind::Boolean))
    }

    fn map(value: Value) -> PropertyMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_declarative_follows_declared_order() {
        let d = descriptor();
        let mut r = ResourceInstance::new(&d, "/tmp/x").unwrap();
        r.set("content", json!("hi")).unwrap();
        r.backfill();

        let current = map(json!({
            "mode": "0644",
            "content": "hi",
            "ensure": "present",
            "path": "/tmp/x",
        }));

        let output = declarative(&r, &current);
        let keys: Vec<_> = output.keys().cloned().collect();
        assert_eq!(keys, vec!["path", "ensure", "content", "mode", "groups", "backup"]);
        assert_eq!(output["mode"], json!("0644"));
        assert_eq!(output["groups"], json!([]));
        assert_eq!(output["backup"], Value::Null);
    }

    #[test]
    fn test_declarative_uses_read_back_not_request() {
        let d = descriptor();
        let mut r = ResourceInstance::new(&d, "/tmp/x").unwrap();
        r.set("content", json!("requested")).unwrap();
        r.set("backup", json!(true)).unwrap();

        let current = map(json!({"path": "/tmp/x", "content": "actual"}));
        let output = declarative(&r, &current);
        assert_eq!(output["content"], json!("actual"));
        assert_eq!(output["backup"], json!(true));
        assert_eq!(output["ensure"], Value::Null);
    }

    #[test]
    fn test_imperative_passthrough_keeps_order() {
        let current = map(json!({"name": "web", "running": false, "enabled": null}));
        let output = imperative(current.clone());
        assert_eq!(output, current);
        let keys: Vec<_> = output.keys().cloned().collect();
        assert_eq!(keys, vec!["name", "running", "enabled"]);
    }

    #[test]
    fn test_to_json_keeps_types() {
        let output = to_json(&map(json!({"uid": 1001, "enabled": true, "home": null})), false);
        assert_eq!(output, r#"{"uid":1001,"enabled":true,"home":null}"#);
        assert!(to_json(&map(json!({"a": 1})), true).contains('\n'));
    }
}
